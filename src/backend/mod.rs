pub mod dummy;

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use dummy::{DummyBackend, EchoBackend};

use crate::error::ProcessError;
use crate::runtime::{ProcessRequest, Processor};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub const LAST_COMMAND: &str = "/last";
pub const NO_PREVIOUS_MESSAGE: &str = "No previous message to edit.";

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;
    fn stream_reply(&self, prompt: &str) -> ChunkStream;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Dummy,
    Echo,
}

impl BackendKind {
    pub fn build(self, delay: Duration) -> Arc<dyn Backend> {
        match self {
            Self::Dummy => Arc::new(DummyBackend::new(delay)),
            Self::Echo => Arc::new(EchoBackend::new(delay)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dummy => "dummy",
            Self::Echo => "echo",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dummy" => Ok(Self::Dummy),
            "echo" => Ok(Self::Echo),
            other => bail!("Unknown backend '{other}': expected 'dummy' or 'echo'"),
        }
    }
}

/// Session processor in front of a [`Backend`].
pub struct ChatProcessor {
    backend: Arc<dyn Backend>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl ChatProcessor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Processor for ChatProcessor {
    fn process(&self, request: ProcessRequest) -> BoxFuture<'static, Result<(), ProcessError>> {
        let backend = Arc::clone(&self.backend);
        let last_prompt = Arc::clone(&self.last_prompt);

        async move {
            let prompt = request.input.trim().to_string();
            if prompt.is_empty() {
                return Err(ProcessError::EmptyInput);
            }

            if prompt == LAST_COMMAND {
                let previous = last_prompt
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                return match previous {
                    Some(previous) => Err(ProcessError::UseLastMessage(previous)),
                    None => {
                        request.sink.notice(NO_PREVIOUS_MESSAGE);
                        Err(ProcessError::EmptyInput)
                    }
                };
            }

            *last_prompt.lock().unwrap_or_else(PoisonError::into_inner) = Some(prompt.clone());
            debug!(backend = backend.name(), bytes = prompt.len(), "sending prompt");

            let mut chunks = backend.stream_reply(&prompt);
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = request.cancel.cancelled() => return Err(ProcessError::Cancelled),
                    chunk = chunks.next() => chunk,
                };
                match chunk {
                    Some(Ok(text)) => request.sink.add_response_part(&text),
                    Some(Err(err)) => return Err(ProcessError::Failed(err)),
                    None => return Ok(()),
                }
            }
        }
        .boxed()
    }
}
