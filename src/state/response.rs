use std::fmt;

/// Progress of the backend call behind the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    #[default]
    Ready,
    Submitting,
    Submitted,
    Streaming,
    /// Shown for an instant after a cancelled call, never a resting state.
    Interrupted,
    Error,
}

impl ResponseState {
    pub fn is_processing(self) -> bool {
        matches!(
            self,
            ResponseState::Submitting | ResponseState::Submitted | ResponseState::Streaming
        )
    }

    /// Streamed parts are only rendered in these states.
    pub fn accepts_output(self) -> bool {
        matches!(self, ResponseState::Submitted | ResponseState::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseState::Ready => "ready",
            ResponseState::Submitting => "submitting",
            ResponseState::Submitted => "submitted",
            ResponseState::Streaming => "streaming",
            ResponseState::Interrupted => "interrupted",
            ResponseState::Error => "error",
        }
    }
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
