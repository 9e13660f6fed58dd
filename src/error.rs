use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal conditions of [`crate::app::InteractiveSession::run`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("interrupted")]
    Interrupted,
    #[error("session cancelled")]
    Cancelled,
    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),
}

impl SessionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Interrupted | SessionError::Cancelled => 130,
            SessionError::Input(_) => 1,
        }
    }

    /// Interrupt-to-exit is a normal way to leave, not a failure.
    pub fn is_user_exit(&self) -> bool {
        matches!(self, SessionError::Interrupted)
    }
}

/// Outcomes a processor can return besides success.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty input")]
    EmptyInput,
    /// Asks the session to put the carried text back into the editor.
    #[error("use last message")]
    UseLastMessage(String),
    #[error("processing cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file path is empty")]
    EmptyPath,
    #[error("failed to read history file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write history file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
