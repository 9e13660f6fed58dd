use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "LINECHAT_LOG";
pub const LOG_FILE_ENV: &str = "LINECHAT_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "linechat.log";
const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global subscriber. An interactive terminal keeps stderr for
/// the prompt, so logs go to a file there.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match resolve_log_path(std::io::stderr().is_terminal()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| anyhow!("Failed to install log subscriber: {err}"))
}

fn resolve_log_path(stderr_is_terminal: bool) -> Option<PathBuf> {
    std::env::var(LOG_FILE_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| stderr_is_terminal.then(|| std::env::temp_dir().join(DEFAULT_LOG_FILE)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_log_path_uses_log_file_env() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_FILE_ENV, " /tmp/linechat-test.log ");
        let resolved = resolve_log_path(false);
        std::env::remove_var(LOG_FILE_ENV);
        assert_eq!(resolved, Some(PathBuf::from("/tmp/linechat-test.log")));
    }

    #[test]
    fn test_resolve_log_path_defaults_by_terminal() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::remove_var(LOG_FILE_ENV);
        assert_eq!(
            resolve_log_path(true),
            Some(std::env::temp_dir().join(DEFAULT_LOG_FILE))
        );
        assert_eq!(resolve_log_path(false), None);
    }
}
