use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app::{SessionConfig, DEFAULT_ALT_PROMPT, DEFAULT_PROMPT};
use crate::backend::{BackendKind, ChatProcessor};
use crate::runtime::Processor;
use crate::state::history::DEFAULT_HISTORY_LIMIT;
use crate::util::{expand_tilde, parse_bool_str};

pub const PROMPT_ENV: &str = "LINECHAT_PROMPT";
pub const ALT_PROMPT_ENV: &str = "LINECHAT_ALT_PROMPT";
pub const HISTORY_FILE_ENV: &str = "LINECHAT_HISTORY_FILE";
pub const HISTORY_LIMIT_ENV: &str = "LINECHAT_HISTORY_LIMIT";
pub const BACKEND_ENV: &str = "LINECHAT_BACKEND";
pub const STREAM_DELAY_ENV: &str = "LINECHAT_STREAM_DELAY_MS";
pub const PLAIN_INPUT_ENV: &str = "LINECHAT_PLAIN_INPUT";

const DEFAULT_HISTORY_FILE: &str = "~/.linechat_history";
const DEFAULT_STREAM_DELAY_MS: u64 = 20;
const DEFAULT_INTERRUPT_WINDOW_MS: u64 = 1000;
const MAX_STREAM_DELAY_MS: u64 = 10_000;
const MAX_INTERRUPT_WINDOW_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub prompt: String,
    pub alt_prompt: String,
    /// `None` disables persistent history.
    pub history_file: Option<PathBuf>,
    pub history_limit: usize,
    pub backend: BackendKind,
    pub stream_delay_ms: u64,
    pub interrupt_window_ms: u64,
    /// Read cooked lines even on a terminal.
    pub plain_input: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            alt_prompt: DEFAULT_ALT_PROMPT.to_string(),
            history_file: Some(expand_tilde(DEFAULT_HISTORY_FILE)),
            history_limit: DEFAULT_HISTORY_LIMIT,
            backend: BackendKind::default(),
            stream_delay_ms: DEFAULT_STREAM_DELAY_MS,
            interrupt_window_ms: DEFAULT_INTERRUPT_WINDOW_MS,
            plain_input: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Defaults, then the TOML file at `file` if given, then environment.
    pub fn load_with(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.history_file = config
            .history_file
            .map(|path| expand_tilde(&path.to_string_lossy()));
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(prompt) = std::env::var(PROMPT_ENV) {
            self.prompt = prompt;
        }
        if let Ok(prompt) = std::env::var(ALT_PROMPT_ENV) {
            self.alt_prompt = prompt;
        }
        if let Ok(path) = std::env::var(HISTORY_FILE_ENV) {
            self.history_file = parse_history_file(&path);
        }
        if let Ok(limit) = std::env::var(HISTORY_LIMIT_ENV) {
            self.history_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("Invalid {HISTORY_LIMIT_ENV} '{limit}'"))?;
        }
        if let Ok(backend) = std::env::var(BACKEND_ENV) {
            self.backend = backend.parse()?;
        }
        if let Ok(delay) = std::env::var(STREAM_DELAY_ENV) {
            self.stream_delay_ms = delay
                .trim()
                .parse()
                .with_context(|| format!("Invalid {STREAM_DELAY_ENV} '{delay}'"))?;
        }
        if let Ok(plain) = std::env::var(PLAIN_INPUT_ENV) {
            let Some(plain_input) = parse_bool_str(&plain) else {
                bail!("Invalid {PLAIN_INPUT_ENV} '{plain}': expected true or false");
            };
            self.plain_input = plain_input;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            bail!("Prompt must not be empty");
        }
        if self.history_limit == 0 {
            bail!("History limit must be at least 1");
        }
        if self
            .history_file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            bail!("History file path must not be empty; disable history instead");
        }
        if self.stream_delay_ms > MAX_STREAM_DELAY_MS {
            bail!(
                "Stream delay {}ms is out of range (max {MAX_STREAM_DELAY_MS}ms)",
                self.stream_delay_ms
            );
        }
        if self.interrupt_window_ms == 0 || self.interrupt_window_ms > MAX_INTERRUPT_WINDOW_MS {
            bail!(
                "Interrupt window {}ms is out of range (1..={MAX_INTERRUPT_WINDOW_MS}ms)",
                self.interrupt_window_ms
            );
        }
        Ok(())
    }

    pub fn processor(&self) -> Arc<dyn Processor> {
        let delay = Duration::from_millis(self.stream_delay_ms);
        Arc::new(ChatProcessor::new(self.backend.build(delay)))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            prompt: self.prompt.clone(),
            alt_prompt: self.alt_prompt.clone(),
            history_file: self.history_file.clone(),
            history_limit: self.history_limit,
            interrupt_window: Duration::from_millis(self.interrupt_window_ms),
            processor: Some(self.processor()),
            ..SessionConfig::default()
        }
    }
}

/// An empty value or `none` turns history off.
pub fn parse_history_file(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(expand_tilde(trimmed))
}
