use anyhow::Result;
use clap::Parser;
use linechat::cli::Cli;
use linechat::{logging, terminal, InteractiveSession};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("linechat: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init()?;
    let config = cli.load_config()?;
    config.validate()?;

    let interactive = terminal::stdin_is_terminal() && terminal::stdout_is_terminal();
    let mut session_config = config.session_config();
    let mut session = if interactive && !config.plain_input {
        InteractiveSession::terminal(session_config)?
    } else {
        session_config.show_prompts = interactive;
        session_config.catch_signals = interactive;
        if interactive {
            if let Err(err) = terminal::enable_bracketed_paste() {
                warn!(error = %err, "bracketed paste unavailable");
            }
        }
        InteractiveSession::stdio(session_config)
    };
    info!(backend = %config.backend, interactive, "starting linechat");

    let result = session.run(CancellationToken::new()).await;
    drop(session);
    terminal::restore()?;

    match result {
        Ok(()) => Ok(0),
        Err(err) => {
            if !err.is_user_exit() {
                eprintln!("linechat: {err}");
            }
            Ok(err.exit_code())
        }
    }
}
