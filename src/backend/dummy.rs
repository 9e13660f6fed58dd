use std::time::Duration;

use futures::{stream, StreamExt};

use super::{Backend, ChunkStream};

const DEFAULT_REPLY: &str = "This is a dummy backend response. It will stream out a few hundred tokens to simulate a real backend. The quick brown fox jumps over the lazy dog. This pangram contains every letter of the English alphabet at least once. Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum. This concludes the dummy backend response. Thank you for using the dummy backend!\n";

const PYTHON_REPLY: &str = "This is a dummy backend response. It will stream out a few hundred tokens to simulate a real backend. Here's a Python function to calculate Fibonacci numbers:\n\n```python\ndef fibonacci(n):\n    if n <= 1:\n        return n\n    return fibonacci(n-1) + fibonacci(n-2)\n```\n\nThis concludes the dummy backend response. Thank you for using the dummy backend!\n";

/// Streams canned text word by word.
#[derive(Debug, Clone)]
pub struct DummyBackend {
    delay: Duration,
}

impl DummyBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

pub fn canned_reply(prompt: &str) -> &'static str {
    if prompt.contains("fibonacci") || prompt.contains("Python") {
        PYTHON_REPLY
    } else {
        DEFAULT_REPLY
    }
}

impl Backend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn stream_reply(&self, prompt: &str) -> ChunkStream {
        paced_words(canned_reply(prompt).to_string(), self.delay)
    }
}

/// Streams the prompt back.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    delay: Duration,
}

impl EchoBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn stream_reply(&self, prompt: &str) -> ChunkStream {
        paced_words(format!("{prompt}\n"), self.delay)
    }
}

fn paced_words(text: String, delay: Duration) -> ChunkStream {
    let words: Vec<String> = text.split_inclusive([' ', '\n']).map(str::to_string).collect();
    stream::iter(words)
        .then(move |word| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, anyhow::Error>(word)
        })
        .boxed()
}
