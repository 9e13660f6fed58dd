use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::util::trim_line_endings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Line(String),
    Interrupt,
    Eof,
}

/// Blocking producer of raw input. Runs on the input pump thread.
pub trait LineSource: Send + 'static {
    /// Reads the next input, or `None` once the source is exhausted for
    /// good. Sources that can wait without blocking forever should return
    /// `None` soon after `closed` is set.
    fn read_input(&mut self, closed: &AtomicBool) -> io::Result<Option<RawInput>>;
}

pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead + Send + 'static> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl ReaderSource<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> LineSource for ReaderSource<R> {
    fn read_input(&mut self, _closed: &AtomicBool) -> io::Result<Option<RawInput>> {
        let mut raw = Vec::new();
        let bytes = self.reader.read_until(b'\n', &mut raw)?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(RawInput::Line(trim_line_endings(
            &String::from_utf8_lossy(&raw),
        ))))
    }
}

/// Input pushed from another thread; a dropped sender reads as end of input.
pub struct ChannelSource {
    inputs: std_mpsc::Receiver<RawInput>,
}

impl ChannelSource {
    pub fn pair() -> (std_mpsc::Sender<RawInput>, Self) {
        let (tx, inputs) = std_mpsc::channel();
        (tx, Self { inputs })
    }
}

const CHANNEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl LineSource for ChannelSource {
    fn read_input(&mut self, closed: &AtomicBool) -> io::Result<Option<RawInput>> {
        loop {
            if closed.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match self.inputs.recv_timeout(CHANNEL_POLL_INTERVAL) {
                Ok(input) => return Ok(Some(input)),
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

/// Runs a [`LineSource`] on its own thread so the session loop can await
/// input next to task reports and signals.
pub struct InputPump {
    requests: std_mpsc::Sender<()>,
    events: mpsc::UnboundedReceiver<io::Result<RawInput>>,
    closed: Arc<AtomicBool>,
    outstanding: bool,
}

impl InputPump {
    pub fn spawn(mut source: Box<dyn LineSource>) -> io::Result<Self> {
        let (requests, request_rx) = std_mpsc::channel::<()>();
        let (event_tx, events) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let thread_closed = Arc::clone(&closed);

        thread::Builder::new()
            .name("linechat-input".to_string())
            .spawn(move || {
                for () in request_rx.iter() {
                    if thread_closed.load(Ordering::Relaxed) {
                        break;
                    }
                    let result = match source.read_input(&thread_closed) {
                        Ok(Some(input)) => Ok(input),
                        Ok(None) => break,
                        Err(err) => Err(err),
                    };
                    let stop = result.is_err();
                    if event_tx.send(result).is_err() || stop {
                        break;
                    }
                }
                debug!("input pump stopped");
            })?;

        Ok(Self {
            requests,
            events,
            closed,
            outstanding: false,
        })
    }

    pub fn request(&mut self) {
        if self.outstanding || self.closed.load(Ordering::Relaxed) {
            return;
        }
        if self.requests.send(()).is_ok() {
            self.outstanding = true;
        }
    }

    /// Cancel safe: a dropped call leaves the outstanding read in place.
    pub async fn next(&mut self) -> Option<io::Result<RawInput>> {
        let event = self.events.recv().await;
        self.outstanding = false;
        event
    }

    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.close();
    }
}
