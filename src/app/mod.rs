mod render;

pub use render::{Renderer, SharedOutput};

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, ChatProcessor};
use crate::error::SessionError;
use crate::input::paste::{DEFAULT_PASTE_REDRAW_INTERVAL, DEFAULT_PASTE_REPORT_THRESHOLD};
use crate::input::{
    lock_surface, new_surface, EditSurface, Feed, InputBuffer, InputMode, InputPump, LineSource,
    Observed, PasteAccumulator, RawInput, ReaderSource, TerminalEditor,
};
use crate::runtime::{ProcessTask, Processor, TaskReport};
use crate::state::history::DEFAULT_HISTORY_LIMIT;
use crate::state::machine::{dropped_queued_notice, DEFAULT_INTERRUPT_WINDOW};
use crate::state::{
    Effect, ExitReason, HistoryStore, LoadStatus, ResponseState, SessionStateMachine, TaskId,
    Trigger,
};
use crate::util::ensure_trailing_space;

pub const DEFAULT_PROMPT: &str = ">>> ";
pub const DEFAULT_ALT_PROMPT: &str = "... ";
pub const SINGLE_LINE_HINT: &str = "Enter prompt (\"\"\" for multi-line, Ctrl+D to submit/exit)";
pub const MULTI_LINE_HINT: &str = "Multi-line mode: end with \"\"\"";
pub const PENDING_GLYPH: &str = "↵";

#[derive(Clone)]
pub struct SessionConfig {
    pub prompt: String,
    pub alt_prompt: String,
    pub single_line_hint: String,
    pub multi_line_hint: String,
    pub history_file: Option<PathBuf>,
    pub history_limit: usize,
    pub initial_history: Vec<String>,
    pub interrupt_window: Duration,
    pub paste_redraw_interval: Duration,
    pub paste_report_threshold: usize,
    pub show_prompts: bool,
    /// Treat SIGINT as the interrupt key. Raw-mode input reports Ctrl+C
    /// itself; cooked input needs this.
    pub catch_signals: bool,
    pub processor: Option<Arc<dyn Processor>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            alt_prompt: DEFAULT_ALT_PROMPT.to_string(),
            single_line_hint: SINGLE_LINE_HINT.to_string(),
            multi_line_hint: MULTI_LINE_HINT.to_string(),
            history_file: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            initial_history: Vec::new(),
            interrupt_window: DEFAULT_INTERRUPT_WINDOW,
            paste_redraw_interval: DEFAULT_PASTE_REDRAW_INTERVAL,
            paste_report_threshold: DEFAULT_PASTE_REPORT_THRESHOLD,
            show_prompts: true,
            catch_signals: false,
            processor: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("prompt", &self.prompt)
            .field("alt_prompt", &self.alt_prompt)
            .field("history_file", &self.history_file)
            .field("history_limit", &self.history_limit)
            .field("initial_history", &self.initial_history.len())
            .field("interrupt_window", &self.interrupt_window)
            .field("show_prompts", &self.show_prompts)
            .field("catch_signals", &self.catch_signals)
            .field("processor", &self.processor.is_some())
            .finish_non_exhaustive()
    }
}

pub fn prompt_for(
    mode: InputMode,
    state: ResponseState,
    pending_submit: bool,
    config: &SessionConfig,
) -> String {
    if state.is_processing() {
        return String::new();
    }
    match mode {
        InputMode::MultiLine => config.alt_prompt.clone(),
        InputMode::SingleLine if pending_submit => format!("{}{PENDING_GLYPH} ", config.prompt),
        InputMode::SingleLine => config.prompt.clone(),
    }
}

struct Shared {
    machine: SessionStateMachine,
    renderer: Renderer,
}

impl Shared {
    fn stream_part(&mut self, task: TaskId, part: &str) {
        let effects = self.machine.apply(
            Trigger::StreamPart {
                task,
                text: part.to_string(),
            },
            Instant::now(),
        );
        for effect in effects {
            if let Effect::Render(text) = effect {
                self.renderer.write_part(&text);
            }
        }
    }

    fn set_state(&mut self, task: TaskId, state: ResponseState) {
        self.machine
            .apply(Trigger::SetState { task, state }, Instant::now());
    }
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle for feeding the running response from any thread.
#[derive(Clone)]
pub struct SessionHandle {
    shared: SharedState,
}

impl SessionHandle {
    /// Renders `part` for the live task. Dropped when nothing is running.
    pub fn add_response_part(&self, part: &str) {
        let mut shared = lock(&self.shared);
        if let Some(task) = shared.machine.live_task() {
            shared.stream_part(task, part);
        }
    }

    pub fn set_response_state(&self, state: ResponseState) {
        let mut shared = lock(&self.shared);
        if let Some(task) = shared.machine.live_task() {
            shared.set_state(task, state);
        }
    }

    pub fn response_state(&self) -> ResponseState {
        lock(&self.shared).machine.state()
    }
}

#[derive(Debug, Default)]
struct Captured {
    parts: Vec<String>,
    states: Vec<ResponseState>,
    notices: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    inner: Arc<Mutex<Captured>>,
}

impl CapturedResponse {
    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parts(&self) -> Vec<String> {
        self.lock().parts.clone()
    }

    pub fn text(&self) -> String {
        self.lock().parts.concat()
    }

    pub fn states(&self) -> Vec<ResponseState> {
        self.lock().states.clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.lock().notices.clone()
    }
}

#[derive(Clone)]
enum SinkTarget {
    Session { shared: SharedState, task: TaskId },
    Capture(CapturedResponse),
}

/// Output channel handed to a processor for one task. Writes from a task
/// that is no longer live are dropped.
#[derive(Clone)]
pub struct ResponseSink {
    target: SinkTarget,
}

impl ResponseSink {
    fn for_task(shared: SharedState, task: TaskId) -> Self {
        Self {
            target: SinkTarget::Session { shared, task },
        }
    }

    pub fn capture() -> (Self, CapturedResponse) {
        let captured = CapturedResponse::default();
        let sink = Self {
            target: SinkTarget::Capture(captured.clone()),
        };
        (sink, captured)
    }

    pub fn task(&self) -> Option<TaskId> {
        match &self.target {
            SinkTarget::Session { task, .. } => Some(*task),
            SinkTarget::Capture(_) => None,
        }
    }

    pub fn add_response_part(&self, part: &str) {
        match &self.target {
            SinkTarget::Session { shared, task } => lock(shared).stream_part(*task, part),
            SinkTarget::Capture(captured) => captured.lock().parts.push(part.to_string()),
        }
    }

    pub fn set_response_state(&self, state: ResponseState) {
        match &self.target {
            SinkTarget::Session { shared, task } => lock(shared).set_state(*task, state),
            SinkTarget::Capture(captured) => captured.lock().states.push(state),
        }
    }

    pub fn notice(&self, text: &str) {
        match &self.target {
            SinkTarget::Session { shared, task } => {
                let mut shared = lock(shared);
                if shared.machine.live_task() == Some(*task) {
                    shared.renderer.notice(text);
                }
            }
            SinkTarget::Capture(captured) => captured.lock().notices.push(text.to_string()),
        }
    }
}

struct RunContext {
    tasks: CancellationToken,
    reports: mpsc::UnboundedSender<TaskReport>,
}

/// One interactive prompt/response loop.
///
/// Lines flow from the [`LineSource`] through the paste accumulator and the
/// input buffer into the state machine; submitted text runs as a
/// [`ProcessTask`] while input keeps being read.
pub struct InteractiveSession {
    config: SessionConfig,
    processor: Arc<dyn Processor>,
    source: Option<Box<dyn LineSource>>,
    shared: SharedState,
    surface: Option<EditSurface>,
    buffer: InputBuffer,
    paste: PasteAccumulator,
    history: HistoryStore,
    live: Option<ProcessTask>,
    retiring: Vec<ProcessTask>,
}

impl InteractiveSession {
    pub fn new(mut config: SessionConfig, source: Box<dyn LineSource>, renderer: Renderer) -> Self {
        config.prompt = ensure_trailing_space(&config.prompt);
        config.alt_prompt = ensure_trailing_space(&config.alt_prompt);
        let processor = config.processor.clone().unwrap_or_else(|| {
            Arc::new(ChatProcessor::new(BackendKind::Echo.build(Duration::ZERO)))
        });
        let renderer = renderer.with_prompts(config.show_prompts);
        let surface = renderer.surface().cloned();
        let machine = SessionStateMachine::new(config.interrupt_window);
        let paste =
            PasteAccumulator::new(config.paste_redraw_interval, config.paste_report_threshold);
        let history = HistoryStore::new(config.history_limit);

        Self {
            config,
            processor,
            source: Some(source),
            shared: Arc::new(Mutex::new(Shared { machine, renderer })),
            surface,
            buffer: InputBuffer::new(),
            paste,
            history,
            live: None,
            retiring: Vec::new(),
        }
    }

    pub fn terminal(config: SessionConfig) -> io::Result<Self> {
        let surface = new_surface();
        let editor = TerminalEditor::new(Arc::clone(&surface))?;
        let renderer = Renderer::stdio().with_surface(surface);
        Ok(Self::new(config, Box::new(editor), renderer))
    }

    pub fn stdio(config: SessionConfig) -> Self {
        Self::new(config, Box::new(ReaderSource::stdin()), Renderer::stdio())
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn add_response_part(&self, part: &str) {
        self.handle().add_response_part(part);
    }

    pub fn set_response_state(&self, state: ResponseState) {
        self.handle().set_response_state(state);
    }

    pub fn response_state(&self) -> ResponseState {
        lock(&self.shared).machine.state()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Reads and processes input until end of input, an exit request, a
    /// double interrupt or `shutdown`. A session runs once.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), SessionError> {
        let source = self
            .source
            .take()
            .ok_or_else(|| SessionError::Input(io::Error::other("session already ran")))?;

        self.load_history();
        let mut pump = InputPump::spawn(source).map_err(SessionError::Input)?;
        let (reports, mut report_rx) = mpsc::unbounded_channel();
        let ctx = RunContext {
            tasks: shutdown.child_token(),
            reports,
        };

        if self.surface.is_none() && self.config.show_prompts {
            let hint = self.config.single_line_hint.clone();
            lock(&self.shared).renderer.notice(&hint);
        }
        info!("session started");

        let result = self
            .event_loop(&shutdown, &ctx, &mut pump, &mut report_rx)
            .await;

        ctx.tasks.cancel();
        if let Some(live) = self.live.take() {
            live.cancel();
            self.retiring.push(live);
        }
        for task in self.retiring.drain(..) {
            task.done().await;
        }
        pump.close();
        lock(&self.shared).renderer.finish();
        self.save_history();

        match &result {
            Ok(()) => info!("session ended"),
            Err(err) => info!(error = %err, "session ended"),
        }
        result
    }

    async fn event_loop(
        &mut self,
        shutdown: &CancellationToken,
        ctx: &RunContext,
        pump: &mut InputPump,
        report_rx: &mut mpsc::UnboundedReceiver<TaskReport>,
    ) -> Result<(), SessionError> {
        let mut input_open = true;
        let mut interrupts = InterruptListener::new(self.config.catch_signals);
        loop {
            self.refresh_prompt();
            if input_open {
                pump.request();
            }
            let hint_deadline = lock(&self.shared).machine.hint_deadline();

            let effects = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("session shutdown requested");
                    return Err(SessionError::Cancelled);
                }
                Some(report) = report_rx.recv() => self.on_report(report),
                _ = interrupts.recv() => self.on_interrupt(),
                _ = hint_expiry(hint_deadline) => self.apply(Trigger::HintExpired),
                event = pump.next(), if input_open => match event {
                    Some(Ok(input)) => self.on_input(input),
                    Some(Err(err)) => {
                        warn!(error = %err, "input source failed");
                        return Err(SessionError::Input(err));
                    }
                    None => {
                        debug!("input source exhausted");
                        input_open = false;
                        self.on_input_closed()
                    }
                },
            };

            if let Some(exit) = self.perform(effects, ctx).await {
                return exit;
            }
        }
    }

    fn apply(&self, trigger: Trigger) -> Vec<Effect> {
        lock(&self.shared).machine.apply(trigger, Instant::now())
    }

    fn on_input(&mut self, input: RawInput) -> Vec<Effect> {
        match input {
            RawInput::Line(raw) => {
                lock(&self.shared).renderer.line_entered();
                match self.paste.observe(&raw) {
                    Observed::Pending { redraw } => {
                        if redraw {
                            lock(&self.shared).renderer.refresh();
                        }
                        Vec::new()
                    }
                    Observed::Pasted(text) => {
                        if let Some(report) = self.paste.report_for(&text) {
                            lock(&self.shared).renderer.notice(&report);
                        }
                        let mode = self.buffer.mode();
                        let feed = self.buffer.append_pasted(&text);
                        self.after_feed(mode, feed)
                    }
                    Observed::Line(line) => {
                        let mode = self.buffer.mode();
                        let feed = self.buffer.feed(&line);
                        self.after_feed(mode, feed)
                    }
                }
            }
            RawInput::Interrupt => self.on_interrupt(),
            RawInput::Eof => {
                let buffered = self.take_buffered();
                self.apply(Trigger::EndOfInput { buffered })
            }
        }
    }

    fn after_feed(&mut self, mode_before: InputMode, feed: Feed) -> Vec<Effect> {
        match feed {
            Feed::Submit => {
                let text = self.buffer.take();
                self.apply(Trigger::Submit(text))
            }
            Feed::Exit => self.apply(Trigger::Quit),
            Feed::Pending | Feed::Continue => {
                let entered_block = mode_before == InputMode::SingleLine
                    && self.buffer.mode() == InputMode::MultiLine;
                if entered_block && self.surface.is_none() && self.config.show_prompts {
                    let hint = self.config.multi_line_hint.clone();
                    lock(&self.shared).renderer.notice(&hint);
                }
                self.apply(Trigger::Activity)
            }
        }
    }

    fn on_interrupt(&mut self) -> Vec<Effect> {
        let typed = self
            .surface
            .as_ref()
            .is_some_and(|surface| lock_surface(surface).has_text());
        let input_pending = typed || self.buffer.has_content() || self.paste.is_pasting();
        self.apply(Trigger::Interrupt { input_pending })
    }

    fn on_input_closed(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(text) = self.take_buffered() {
            effects = self.apply(Trigger::EndOfInput {
                buffered: Some(text),
            });
        }
        effects.extend(self.apply(Trigger::EndOfInput { buffered: None }));
        effects
    }

    fn take_buffered(&mut self) -> Option<String> {
        if let Some(partial) = self.paste.take_partial() {
            self.buffer.append_pasted(&partial);
        }
        let text = self.buffer.take();
        (!text.trim().is_empty()).then_some(text)
    }

    fn on_report(&mut self, report: TaskReport) -> Vec<Effect> {
        if self.live.as_ref().is_some_and(|task| task.id() == report.task) {
            self.live = None;
        }
        self.retiring
            .retain(|task| task.id() != report.task && !task.is_finished());
        self.apply(Trigger::TaskCompleted {
            task: report.task,
            outcome: report.outcome,
        })
    }

    async fn perform(
        &mut self,
        effects: Vec<Effect>,
        ctx: &RunContext,
    ) -> Option<Result<(), SessionError>> {
        for effect in effects {
            match effect {
                Effect::StartTask { task, input } => self.start_task(task, input, ctx).await,
                Effect::CancelTask(task) => self.cancel_task(task),
                Effect::ClearInput => {
                    self.buffer.reset();
                    self.paste.reset();
                    lock(&self.shared).renderer.clear_input();
                }
                Effect::Render(text) => lock(&self.shared).renderer.write_part(&text),
                Effect::InterruptMarker => lock(&self.shared).renderer.interrupt_marker(),
                Effect::Notice(text) => lock(&self.shared).renderer.notice(text),
                Effect::DroppedQueued(count) => lock(&self.shared)
                    .renderer
                    .notice(&dropped_queued_notice(count)),
                Effect::ShowError(message) => lock(&self.shared)
                    .renderer
                    .error(&format!("Processing error: {message}")),
                Effect::ArmExitHint => lock(&self.shared).renderer.exit_hint(true),
                Effect::ClearExitHint => lock(&self.shared).renderer.exit_hint(false),
                Effect::RecordHistory(entry) => self.record_history(&entry),
                Effect::OfferRecall(text) => {
                    if let Some(surface) = &self.surface {
                        lock_surface(surface).offer_recall(&text);
                    }
                }
                Effect::Exit(ExitReason::EndOfInput) => return Some(Ok(())),
                Effect::Exit(ExitReason::Interrupted) => {
                    return Some(Err(SessionError::Interrupted))
                }
            }
        }
        None
    }

    async fn start_task(&mut self, task: TaskId, input: String, ctx: &RunContext) {
        // A cancelled task finishes promptly; let it go before the next one.
        for retired in self.retiring.drain(..) {
            retired.done().await;
        }
        self.apply(Trigger::TaskStarted(task));
        let sink = ResponseSink::for_task(Arc::clone(&self.shared), task);
        self.live = Some(ProcessTask::start(
            &ctx.tasks,
            task,
            input,
            Arc::clone(&self.processor),
            sink,
            ctx.reports.clone(),
        ));
    }

    fn cancel_task(&mut self, task: TaskId) {
        if self.live.as_ref().is_some_and(|live| live.id() == task) {
            if let Some(live) = self.live.take() {
                live.cancel();
                self.retiring.push(live);
            }
        }
    }

    fn refresh_prompt(&self) {
        let mut shared = lock(&self.shared);
        let state = shared.machine.state();
        let mode = self.buffer.mode();
        let prompt = prompt_for(mode, state, self.buffer.pending_submit(), &self.config);
        let placeholder = match mode {
            InputMode::SingleLine if self.buffer.is_empty() => {
                Some(self.config.single_line_hint.as_str())
            }
            InputMode::SingleLine => None,
            InputMode::MultiLine => Some(self.config.multi_line_hint.as_str()),
        };
        shared
            .renderer
            .set_prompt(&prompt, !state.is_processing(), placeholder);
    }

    fn load_history(&mut self) {
        self.history = HistoryStore::with_entries(
            self.config.initial_history.iter().cloned(),
            self.config.history_limit,
        );
        if let Some(path) = self.config.history_file.clone() {
            match self.history.load_file(&path) {
                Ok(LoadStatus::Unrecognized) => lock(&self.shared).renderer.warning(&format!(
                    "ignoring unrecognized history file {}",
                    path.display()
                )),
                Ok(status) => debug!(?status, "history loaded"),
                Err(err) => {
                    warn!(error = %err, "failed to load history");
                    lock(&self.shared).renderer.warning(&err.to_string());
                }
            }
        }
        self.sync_surface_history();
    }

    fn record_history(&mut self, entry: &str) {
        if self.history.push(entry) {
            self.save_history();
        }
        self.sync_surface_history();
    }

    fn save_history(&self) {
        let Some(path) = &self.config.history_file else {
            return;
        };
        if let Err(err) = self.history.save_file(path) {
            warn!(error = %err, "failed to save history");
            lock(&self.shared).renderer.warning(&err.to_string());
        }
    }

    fn sync_surface_history(&self) {
        if let Some(surface) = &self.surface {
            lock_surface(surface).set_history(self.history.entries().to_vec());
        }
    }
}

/// SIGINT listener registered once per run, so a signal that lands while
/// effects are being performed is still delivered on the next poll.
struct InterruptListener {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
    #[cfg(not(unix))]
    enabled: bool,
}

impl InterruptListener {
    #[cfg(unix)]
    fn new(enabled: bool) -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let signal = if enabled {
            signal(SignalKind::interrupt())
                .map_err(|err| warn!(error = %err, "cannot listen for Ctrl+C"))
                .ok()
        } else {
            None
        };
        Self { signal }
    }

    #[cfg(not(unix))]
    fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        if let Some(signal) = self.signal.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
            self.signal = None;
        }
        std::future::pending::<()>().await
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        if self.enabled {
            match tokio::signal::ctrl_c().await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = %err, "cannot listen for Ctrl+C");
                    self.enabled = false;
                }
            }
        }
        std::future::pending::<()>().await
    }
}

async fn hint_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn test_prompt_is_empty_while_processing() {
        for state in [
            ResponseState::Submitting,
            ResponseState::Submitted,
            ResponseState::Streaming,
        ] {
            assert_eq!(prompt_for(InputMode::SingleLine, state, true, &config()), "");
        }
    }

    #[test]
    fn test_prompt_variants() {
        let cfg = config();
        assert_eq!(
            prompt_for(InputMode::SingleLine, ResponseState::Ready, false, &cfg),
            ">>> "
        );
        assert_eq!(
            prompt_for(InputMode::SingleLine, ResponseState::Ready, true, &cfg),
            ">>> ↵ "
        );
        assert_eq!(
            prompt_for(InputMode::MultiLine, ResponseState::Error, false, &cfg),
            "... "
        );
    }

    #[test]
    fn test_new_session_normalizes_prompts() {
        let (_tx, source) = crate::input::ChannelSource::pair();
        let session = InteractiveSession::new(
            SessionConfig {
                prompt: ">".to_string(),
                alt_prompt: "..".to_string(),
                ..SessionConfig::default()
            },
            Box::new(source),
            Renderer::new(Box::new(SharedOutput::new()), Box::new(SharedOutput::new())),
        );
        assert_eq!(session.config.prompt, "> ");
        assert_eq!(session.config.alt_prompt, ".. ");
        assert_eq!(session.response_state(), ResponseState::Ready);
    }

    #[test]
    fn test_handle_drops_parts_without_live_task() {
        let out = SharedOutput::new();
        let (_tx, source) = crate::input::ChannelSource::pair();
        let session = InteractiveSession::new(
            config(),
            Box::new(source),
            Renderer::new(Box::new(out.clone()), Box::new(SharedOutput::new())),
        );
        session.add_response_part("stray");
        session.set_response_state(ResponseState::Streaming);
        assert_eq!(out.contents(), "");
        assert_eq!(session.response_state(), ResponseState::Ready);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_listener_keeps_signal_raised_between_polls() {
        let mut interrupts = InterruptListener::new(true);
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("kill -INT {}", std::process::id()))
            .status()
            .expect("raise SIGINT");
        assert!(status.success());
        tokio::time::timeout(Duration::from_secs(5), interrupts.recv())
            .await
            .expect("SIGINT should be delivered");
    }

    #[tokio::test]
    async fn test_disabled_interrupt_listener_never_fires() {
        let mut interrupts = InterruptListener::new(false);
        let fired = tokio::time::timeout(Duration::from_millis(20), interrupts.recv()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn test_capture_sink_records_everything() {
        let (sink, captured) = ResponseSink::capture();
        sink.add_response_part("a");
        sink.add_response_part("b");
        sink.set_response_state(ResponseState::Streaming);
        sink.notice("note");
        assert_eq!(sink.task(), None);
        assert_eq!(captured.text(), "ab");
        assert_eq!(captured.states(), vec![ResponseState::Streaming]);
        assert_eq!(captured.notices(), vec!["note".to_string()]);
    }
}
