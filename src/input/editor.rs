use std::fs;
use std::io::{self, Write};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::terminal::{self as crossterm_terminal, Clear, ClearType};
use tracing::{debug, warn};

use super::metrics::{
    clamp_to_char_boundary_left, display_width, truncate_to_display_width, visible_window,
};
use super::paste::frame_paste;
use super::source::{LineSource, RawInput};
use crate::terminal;
use crate::util::dim;

const EDITOR_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_COLUMNS: usize = 80;
const DEFAULT_EXTERNAL_EDITOR: &str = "vi";

#[derive(Debug, Clone, Default)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
    history_index: Option<usize>,
    history_stash: Option<String>,
}

impl LineEditor {
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        clamp_to_char_boundary_left(&self.buffer, self.cursor)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        self.reset_navigation();
        std::mem::take(&mut self.buffer)
    }

    pub fn clear(&mut self) {
        self.take();
    }

    pub fn set_buffer(&mut self, text: String) {
        self.buffer = text;
        self.cursor = self.buffer.len();
    }

    fn reset_navigation(&mut self) {
        self.history_index = None;
        self.history_stash = None;
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor()]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        let cursor = self.cursor();
        self.buffer[cursor..]
            .chars()
            .next()
            .map(|ch| cursor + ch.len_utf8())
            .unwrap_or(self.buffer.len())
    }

    pub fn insert_char(&mut self, ch: char) {
        let cursor = self.cursor();
        self.buffer.insert(cursor, ch);
        self.cursor = cursor + ch.len_utf8();
        self.reset_navigation();
    }

    pub fn insert_str(&mut self, text: &str) {
        let text = text.replace('\r', "");
        if text.is_empty() {
            return;
        }
        let cursor = self.cursor();
        self.buffer.insert_str(cursor, &text);
        self.cursor = cursor + text.len();
        self.reset_navigation();
    }

    pub fn backspace(&mut self) -> bool {
        let cursor = self.cursor();
        if cursor == 0 {
            return false;
        }
        let prev = self.prev_boundary();
        self.buffer.replace_range(prev..cursor, "");
        self.cursor = prev;
        self.reset_navigation();
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        let cursor = self.cursor();
        if cursor >= self.buffer.len() {
            return false;
        }
        let next = self.next_boundary();
        self.buffer.replace_range(cursor..next, "");
        self.reset_navigation();
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor() == 0 {
            return false;
        }
        self.cursor = self.prev_boundary();
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor() >= self.buffer.len() {
            return false;
        }
        self.cursor = self.next_boundary();
        true
    }

    pub fn move_home(&mut self) -> bool {
        let moved = self.cursor() != 0;
        self.cursor = 0;
        moved
    }

    pub fn move_end(&mut self) -> bool {
        let moved = self.cursor() != self.buffer.len();
        self.cursor = self.buffer.len();
        moved
    }

    pub fn kill_to_start(&mut self) -> bool {
        let cursor = self.cursor();
        if cursor == 0 {
            return false;
        }
        self.buffer.replace_range(..cursor, "");
        self.cursor = 0;
        self.reset_navigation();
        true
    }

    pub fn kill_to_end(&mut self) -> bool {
        let cursor = self.cursor();
        if cursor >= self.buffer.len() {
            return false;
        }
        self.buffer.truncate(cursor);
        self.reset_navigation();
        true
    }

    /// Steps back through `history`, stashing the draft on the first step.
    pub fn history_up(&mut self, history: &[String]) -> bool {
        let index = match self.history_index {
            None if history.is_empty() => return false,
            None => {
                self.history_stash = Some(self.buffer.clone());
                history.len() - 1
            }
            Some(0) => return false,
            Some(current) => current - 1,
        };
        self.history_index = Some(index);
        self.set_buffer(history[index].clone());
        true
    }

    pub fn history_down(&mut self, history: &[String]) -> bool {
        let Some(current) = self.history_index else {
            return false;
        };
        if current + 1 < history.len() {
            self.history_index = Some(current + 1);
            self.set_buffer(history[current + 1].clone());
            return true;
        }
        let draft = self.history_stash.take().unwrap_or_default();
        self.history_index = None;
        self.set_buffer(draft);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    Changed,
    Submit(String),
    Interrupt,
    Eof,
}

fn changed(moved: bool) -> EditorAction {
    if moved {
        EditorAction::Changed
    } else {
        EditorAction::None
    }
}

pub fn apply_editor_key_event(
    editor: &mut LineEditor,
    key: KeyEvent,
    history: &[String],
) -> EditorAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return EditorAction::Interrupt,
            KeyCode::Char('d') if editor.is_empty() => return EditorAction::Eof,
            KeyCode::Char('d') => return changed(editor.delete_forward()),
            KeyCode::Char('a') => return changed(editor.move_home()),
            KeyCode::Char('e') => return changed(editor.move_end()),
            KeyCode::Char('b') => return changed(editor.move_left()),
            KeyCode::Char('f') => return changed(editor.move_right()),
            KeyCode::Char('k') => return changed(editor.kill_to_end()),
            KeyCode::Char('u') => return changed(editor.kill_to_start()),
            KeyCode::Char('p') => return changed(editor.history_up(history)),
            KeyCode::Char('n') => return changed(editor.history_down(history)),
            _ => return EditorAction::None,
        }
    }

    match key.code {
        KeyCode::Enter => EditorAction::Submit(editor.take()),
        KeyCode::Backspace => changed(editor.backspace()),
        KeyCode::Delete => changed(editor.delete_forward()),
        KeyCode::Left => changed(editor.move_left()),
        KeyCode::Right => changed(editor.move_right()),
        KeyCode::Home => changed(editor.move_home()),
        KeyCode::End => changed(editor.move_end()),
        KeyCode::Up => changed(editor.history_up(history)),
        KeyCode::Down => changed(editor.history_down(history)),
        KeyCode::Tab => {
            editor.insert_char('\t');
            EditorAction::Changed
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) => {
            editor.insert_char(c);
            EditorAction::Changed
        }
        _ => EditorAction::None,
    }
}

/// The prompt line shared by the key reader and the renderer.
///
/// The key reader edits it; the renderer erases it before writing output and
/// draws it again afterwards. Nothing is drawn while `editing` is false.
#[derive(Debug, Default)]
pub struct EditLine {
    editor: LineEditor,
    prompt: String,
    placeholder: Option<String>,
    exit_hint: Option<String>,
    history: Vec<String>,
    editing: bool,
    drawn: bool,
}

pub type EditSurface = Arc<Mutex<EditLine>>;

pub fn new_surface() -> EditSurface {
    Arc::new(Mutex::new(EditLine::default()))
}

pub fn lock_surface(surface: &EditSurface) -> MutexGuard<'_, EditLine> {
    surface.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EditLine {
    pub fn text(&self) -> &str {
        self.editor.buffer()
    }

    pub fn has_text(&self) -> bool {
        !self.editor.is_empty()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn clear(&mut self) {
        self.editor.clear();
    }

    pub fn set_prompt(&mut self, prompt: &str, editing: bool, placeholder: Option<&str>) {
        self.prompt = prompt.to_string();
        self.editing = editing;
        self.placeholder = placeholder.map(str::to_string);
    }

    pub fn set_exit_hint(&mut self, hint: Option<&str>) {
        self.exit_hint = hint.map(str::to_string);
    }

    pub fn set_history(&mut self, entries: Vec<String>) {
        self.history = entries;
    }

    pub fn offer_recall(&mut self, text: &str) {
        if self.history.last().map(String::as_str) != Some(text) {
            self.history.push(text.to_string());
        }
    }

    pub fn erase<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.drawn {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            self.drawn = false;
        }
        Ok(())
    }

    pub fn draw<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.editing {
            self.erase(out)?;
            return out.flush();
        }

        let columns = crossterm_terminal::size()
            .map(|(cols, _)| usize::from(cols))
            .unwrap_or(DEFAULT_COLUMNS);
        let prompt_width = display_width(&self.prompt);
        let room = columns.saturating_sub(prompt_width + 1).max(1);

        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        write!(out, "{}", self.prompt)?;
        let column = if self.editor.is_empty() {
            if let Some(hint) = self.exit_hint.as_deref().or(self.placeholder.as_deref()) {
                write!(out, "{}", dim(&truncate_to_display_width(hint, room)))?;
            }
            prompt_width
        } else {
            let (visible, cursor_col) =
                visible_window(self.editor.buffer(), self.editor.cursor(), room);
            write!(out, "{}", visible.replace('\t', " "))?;
            prompt_width + cursor_col
        };
        queue!(out, MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)))?;
        self.drawn = true;
        out.flush()
    }

    fn finish_line<W: Write>(
        &mut self,
        out: &mut W,
        extra: Option<&str>,
    ) -> io::Result<()> {
        if !self.drawn {
            return Ok(());
        }
        queue!(out, MoveToColumn(0))?;
        write!(out, "\r\n")?;
        if let Some(extra) = extra {
            for line in extra.lines() {
                write!(out, "{line}\r\n")?;
            }
        }
        self.drawn = false;
        out.flush()
    }
}

/// Raw-mode key reader that edits the shared [`EditLine`].
pub struct TerminalEditor {
    surface: EditSurface,
    awaiting_chord: bool,
}

impl TerminalEditor {
    pub fn new(surface: EditSurface) -> io::Result<Self> {
        terminal::enable_input_raw_mode()?;
        Ok(Self {
            surface,
            awaiting_chord: false,
        })
    }

    fn handle_event(&mut self, event: Event) -> io::Result<Option<RawInput>> {
        let mut out = io::stdout();
        match event {
            Event::Paste(text) => {
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                let mut line = lock_surface(&self.surface);
                if !text.contains('\n') {
                    line.editor.insert_str(&text);
                    line.draw(&mut out)?;
                    return Ok(None);
                }
                let before = line.editor.take();
                line.finish_line(&mut out, Some(&text))?;
                Ok(Some(RawInput::Line(format!("{before}{}", frame_paste(&text)))))
            }
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key, &mut out),
            Event::Resize(..) => {
                lock_surface(&self.surface).draw(&mut out)?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, out: &mut io::Stdout) -> io::Result<Option<RawInput>> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if std::mem::take(&mut self.awaiting_chord) && ctrl && key.code == KeyCode::Char('e') {
            return self.edit_externally(out);
        }
        if ctrl && key.code == KeyCode::Char('x') {
            self.awaiting_chord = true;
            return Ok(None);
        }

        let mut guard = lock_surface(&self.surface);
        let line = &mut *guard;
        match apply_editor_key_event(&mut line.editor, key, &line.history) {
            EditorAction::None => Ok(None),
            EditorAction::Changed => {
                line.draw(out)?;
                Ok(None)
            }
            EditorAction::Submit(text) => {
                line.finish_line(out, None)?;
                Ok(Some(RawInput::Line(text)))
            }
            EditorAction::Interrupt => Ok(Some(RawInput::Interrupt)),
            EditorAction::Eof => Ok(Some(RawInput::Eof)),
        }
    }

    /// The surface stays locked while the editor runs so output waits.
    fn edit_externally(&mut self, out: &mut io::Stdout) -> io::Result<Option<RawInput>> {
        let mut line = lock_surface(&self.surface);
        if !line.editing {
            return Ok(None);
        }
        let draft = line.editor.buffer().to_string();
        line.erase(out)?;
        out.flush()?;

        terminal::disable_input_raw_mode()?;
        let edited = edit_in_external_editor(&draft);
        terminal::enable_input_raw_mode()?;

        match edited {
            Ok(text) if text.contains('\n') => {
                line.editor.clear();
                line.draw(out)?;
                line.finish_line(out, Some(&text))?;
                Ok(Some(RawInput::Line(frame_paste(&text))))
            }
            Ok(text) => {
                line.editor.set_buffer(text);
                line.draw(out)?;
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "external editor failed");
                write!(out, "{}\r\n", dim(&format!("External editor failed: {err}")))?;
                line.draw(out)?;
                Ok(None)
            }
        }
    }
}

impl LineSource for TerminalEditor {
    fn read_input(&mut self, closed: &AtomicBool) -> io::Result<Option<RawInput>> {
        loop {
            if closed.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if !event::poll(EDITOR_POLL_INTERVAL)? {
                continue;
            }
            if let Some(input) = self.handle_event(event::read()?)? {
                return Ok(Some(input));
            }
        }
    }
}

impl Drop for TerminalEditor {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_input_raw_mode() {
            debug!(error = %err, "failed to leave raw mode");
        }
    }
}

/// Opens `$EDITOR` (default `vi`) on a temp file holding `initial` and
/// returns the saved text without its final newline.
pub fn edit_in_external_editor(initial: &str) -> io::Result<String> {
    let command = std::env::var("EDITOR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EXTERNAL_EDITOR.to_string());
    let mut parts = command.split_whitespace();
    let program = parts.next().unwrap_or(DEFAULT_EXTERNAL_EDITOR);

    let mut file = tempfile::Builder::new()
        .prefix("linechat_edit_")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let status = Command::new(program).args(parts).arg(file.path()).status()?;
    if !status.success() {
        return Err(io::Error::other(format!("{program} exited with {status}")));
    }

    let content = fs::read_to_string(file.path())?;
    let content = content
        .strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(&content);
    Ok(content.to_string())
}
