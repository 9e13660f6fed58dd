use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{parse_history_file, Config};

#[derive(Parser, Debug, Default)]
#[command(name = "linechat")]
#[command(version, about = "Interactive line-editing chat session")]
pub struct Cli {
    /// TOML config file, read before environment overrides
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Response backend: dummy or echo
    #[arg(long, value_name = "NAME")]
    pub backend: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Prompt shown inside a """ block
    #[arg(long, value_name = "TEXT")]
    pub alt_prompt: Option<String>,

    #[arg(long, value_name = "PATH", conflicts_with = "no_history")]
    pub history_file: Option<String>,

    /// Keep history in memory only
    #[arg(long)]
    pub no_history: bool,

    /// Read plain lines from stdin even on a terminal
    #[arg(long)]
    pub plain: bool,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with(self.config.as_deref())?;
        self.apply(&mut config)?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(backend) = &self.backend {
            config.backend = backend.parse()?;
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(prompt) = &self.alt_prompt {
            config.alt_prompt = prompt.clone();
        }
        if let Some(path) = &self.history_file {
            config.history_file = parse_history_file(path);
        }
        if self.no_history {
            config.history_file = None;
        }
        if self.plain {
            config.plain_input = true;
        }
        Ok(())
    }
}
