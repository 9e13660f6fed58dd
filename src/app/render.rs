use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::input::{lock_surface, EditSurface};
use crate::state::machine::{INTERRUPTED_MARKER, PRESS_AGAIN_TO_EXIT};
use crate::util::dim;

/// Writes responses, notices and the prompt.
///
/// With an [`EditSurface`] the terminal is in raw mode: the edit line is
/// erased before anything is written and redrawn afterwards, and `\n` is
/// written as `\r\n`. Without one, prompts are printed inline before each
/// read when `show_prompts` is set.
pub struct Renderer {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    surface: Option<EditSurface>,
    show_prompts: bool,
    at_line_start: bool,
    prompt_shown: bool,
}

impl Renderer {
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            err,
            surface: None,
            show_prompts: false,
            at_line_start: true,
            prompt_shown: false,
        }
    }

    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_surface(mut self, surface: EditSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_prompts(mut self, show_prompts: bool) -> Self {
        self.show_prompts = show_prompts;
        self
    }

    pub fn surface(&self) -> Option<&EditSurface> {
        self.surface.as_ref()
    }

    pub fn is_raw(&self) -> bool {
        self.surface.is_some()
    }

    pub fn write_part(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let result = self.around_edit_line(|this| {
            let text = translate(this.is_raw(), text);
            this.out.write_all(text.as_bytes())?;
            this.out.flush()?;
            this.at_line_start = text.ends_with('\n');
            Ok(())
        });
        log_write_error(result);
    }

    pub fn interrupt_marker(&mut self) {
        self.line(false, INTERRUPTED_MARKER);
    }

    pub fn notice(&mut self, text: &str) {
        self.line(true, &dim(text));
    }

    pub fn error(&mut self, text: &str) {
        self.line(true, text);
    }

    pub fn warning(&mut self, text: &str) {
        self.line(true, &dim(&format!("Warning: {text}")));
    }

    /// Shows or clears the "press again" hint. Raw mode shows it in the
    /// placeholder slot; cooked mode prints it once.
    pub fn exit_hint(&mut self, armed: bool) {
        match self.surface.clone() {
            Some(surface) => {
                let mut line = lock_surface(&surface);
                line.set_exit_hint(armed.then_some(PRESS_AGAIN_TO_EXIT));
                log_write_error(line.draw(&mut self.out));
            }
            None if armed => self.notice(PRESS_AGAIN_TO_EXIT),
            None => {}
        }
    }

    /// Updates the prompt. `editing` is false while a response is running.
    pub fn set_prompt(&mut self, prompt: &str, editing: bool, placeholder: Option<&str>) {
        let result = (|| -> io::Result<()> {
            if editing && !self.at_line_start {
                self.new_line()?;
            }
            match self.surface.clone() {
                Some(surface) => {
                    let mut line = lock_surface(&surface);
                    line.set_prompt(prompt, editing, placeholder);
                    line.draw(&mut self.out)?;
                }
                None => {
                    if editing && self.show_prompts && !self.prompt_shown && !prompt.is_empty() {
                        self.out.write_all(prompt.as_bytes())?;
                        self.out.flush()?;
                        self.prompt_shown = true;
                    }
                }
            }
            Ok(())
        })();
        log_write_error(result);
    }

    pub fn line_entered(&mut self) {
        self.prompt_shown = false;
        self.at_line_start = true;
    }

    pub fn clear_input(&mut self) {
        if let Some(surface) = self.surface.clone() {
            let mut line = lock_surface(&surface);
            line.clear();
            log_write_error(line.draw(&mut self.out));
        }
    }

    pub fn refresh(&mut self) {
        if let Some(surface) = self.surface.clone() {
            log_write_error(lock_surface(&surface).draw(&mut self.out));
        }
    }

    pub fn finish(&mut self) {
        let result = (|| -> io::Result<()> {
            if let Some(surface) = self.surface.clone() {
                lock_surface(&surface).erase(&mut self.out)?;
            }
            if !self.at_line_start {
                self.new_line()?;
            }
            self.out.flush()?;
            self.err.flush()
        })();
        log_write_error(result);
    }

    fn line(&mut self, to_err: bool, text: &str) {
        let result = self.around_edit_line(|this| {
            if !this.at_line_start {
                this.new_line()?;
            }
            this.out.flush()?;
            let line = translate(this.is_raw(), &format!("{text}\n"));
            let sink = if to_err { &mut this.err } else { &mut this.out };
            sink.write_all(line.as_bytes())?;
            sink.flush()
        });
        log_write_error(result);
        self.prompt_shown = false;
    }

    fn around_edit_line(
        &mut self,
        write: impl FnOnce(&mut Self) -> io::Result<()>,
    ) -> io::Result<()> {
        let Some(surface) = self.surface.clone() else {
            return write(self);
        };
        let mut line = lock_surface(&surface);
        line.erase(&mut self.out)?;
        write(self)?;
        if line.is_editing() && !self.at_line_start {
            self.new_line()?;
        }
        line.draw(&mut self.out)
    }

    fn new_line(&mut self) -> io::Result<()> {
        let newline: &[u8] = if self.is_raw() { b"\r\n" } else { b"\n" };
        self.out.write_all(newline)?;
        self.at_line_start = true;
        Ok(())
    }
}

fn translate(raw: bool, text: &str) -> String {
    if raw {
        text.replace("\r\n", "\n").replace('\n', "\r\n")
    } else {
        text.to_string()
    }
}

fn log_write_error(result: io::Result<()>) {
    if let Err(err) = result {
        warn!(error = %err, "terminal write failed");
    }
}

/// In-memory writer whose contents stay readable after the session owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
