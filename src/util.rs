use std::path::PathBuf;

pub const DIM: &str = "\x1b[90m";
pub const RESET: &str = "\x1b[0m";

pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn dim(text: &str) -> String {
    format!("{DIM}{text}{RESET}")
}

pub fn trim_line_endings(input: &str) -> String {
    input.trim_end_matches(['\r', '\n']).to_string()
}

/// Prompts always end in exactly one separating space.
pub fn ensure_trailing_space(prompt: &str) -> String {
    if prompt.is_empty() || prompt.ends_with(' ') {
        prompt.to_string()
    } else {
        format!("{prompt} ")
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(trimmed)
}

pub fn kib_rounded_up(bytes: usize) -> usize {
    bytes.div_ceil(1024)
}
