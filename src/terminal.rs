use crossterm::{
    cursor::Show,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, IsTerminal};
use std::sync::Once;

static PANIC_HOOK_INSTALLED: Once = Once::new();

pub fn install_panic_hook_once() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = restore();
            original_hook(panic_info);
        }));
    });
}

/// Raw mode plus bracketed paste for the line editor.
pub fn enable_input_raw_mode() -> io::Result<()> {
    install_panic_hook_once();
    enable_raw_mode()?;
    if let Err(err) = execute!(io::stdout(), EnableBracketedPaste) {
        let _ = disable_raw_mode();
        return Err(err);
    }
    Ok(())
}

pub fn disable_input_raw_mode() -> io::Result<()> {
    let _ = execute!(io::stdout(), DisableBracketedPaste);
    disable_raw_mode()
}

/// Asks a cooked terminal to wrap pastes in start/end markers.
pub fn enable_bracketed_paste() -> io::Result<()> {
    install_panic_hook_once();
    execute!(io::stdout(), EnableBracketedPaste)
}

pub fn restore() -> io::Result<()> {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableBracketedPaste, Show);
    Ok(())
}

pub fn stdin_is_terminal() -> bool {
    io::stdin().is_terminal()
}

pub fn stdout_is_terminal() -> bool {
    io::stdout().is_terminal()
}
