pub const BLOCK_MARKER: &str = "\"\"\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    SingleLine,
    MultiLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Content was added; one more empty line confirms it.
    Pending,
    /// The buffer is ready; take it with [`InputBuffer::take`].
    Submit,
    Continue,
    Exit,
}

#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    lines: Vec<String>,
    mode: InputMode,
    pending_submit: bool,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) -> Feed {
        let trimmed = line.trim();

        if trimmed == BLOCK_MARKER {
            return match self.mode {
                InputMode::SingleLine => {
                    self.lines.clear();
                    self.pending_submit = false;
                    self.mode = InputMode::MultiLine;
                    Feed::Continue
                }
                InputMode::MultiLine => {
                    self.mode = InputMode::SingleLine;
                    self.pending_submit = false;
                    self.ready_or_discard()
                }
            };
        }

        if self.mode == InputMode::MultiLine {
            self.lines.push(line.to_string());
            return Feed::Continue;
        }

        if is_exit_token(trimmed) {
            return Feed::Exit;
        }

        if trimmed.is_empty() {
            if self.pending_submit {
                self.pending_submit = false;
                return self.ready_or_discard();
            }
            return Feed::Continue;
        }

        self.lines.push(line.to_string());
        self.pending_submit = true;
        Feed::Pending
    }

    /// Appends pasted text as a unit. Blank lines, markers and exit tokens
    /// inside it are content.
    pub fn append_pasted(&mut self, text: &str) -> Feed {
        if text.is_empty() {
            return Feed::Continue;
        }
        self.lines.extend(text.split('\n').map(str::to_string));
        match self.mode {
            InputMode::MultiLine => Feed::Continue,
            InputMode::SingleLine => {
                self.pending_submit = true;
                Feed::Pending
            }
        }
    }

    pub fn value(&self) -> String {
        self.lines.join("\n")
    }

    pub fn take(&mut self) -> String {
        let value = self.value();
        self.reset();
        value
    }

    pub fn reset(&mut self) {
        self.lines.clear();
        self.mode = InputMode::SingleLine;
        self.pending_submit = false;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when an interrupt would have something to clear.
    pub fn has_content(&self) -> bool {
        !self.lines.is_empty() || self.pending_submit || self.mode == InputMode::MultiLine
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn pending_submit(&self) -> bool {
        self.pending_submit
    }

    fn ready_or_discard(&mut self) -> Feed {
        if self.value().trim().is_empty() {
            self.reset();
            Feed::Continue
        } else {
            Feed::Submit
        }
    }
}

fn is_exit_token(trimmed: &str) -> bool {
    matches!(trimmed, "exit" | "quit")
}
