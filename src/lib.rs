pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod util;

#[cfg(test)]
mod test_support;

pub use app::{InteractiveSession, ResponseSink, SessionConfig, SessionHandle};
pub use error::{ProcessError, SessionError};
pub use state::ResponseState;
