use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use super::response::ResponseState;

pub type TaskId = u64;

pub const DEFAULT_INTERRUPT_WINDOW: Duration = Duration::from_secs(1);

pub const INPUT_CLEARED: &str = "Input cleared.";
pub const PRESS_AGAIN_TO_EXIT: &str = "Press Ctrl+C again to exit.";
pub const EXITING: &str = "Exiting...";
pub const RECALL_HINT: &str = "Use Up Arrow to recall last input for editing.";
pub const QUEUED: &str = "Queued; sending when the current response finishes.";
pub const INTERRUPTED_MARKER: &str = "[Interrupted]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The processor handed back text for the user to edit.
    Recall(String),
    Empty,
    Interrupted,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    EndOfInput,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Submit(String),
    Interrupt { input_pending: bool },
    /// Ctrl+D or a closed input stream. `buffered` carries unsubmitted text.
    EndOfInput { buffered: Option<String> },
    Quit,
    Activity,
    TaskStarted(TaskId),
    StreamPart { task: TaskId, text: String },
    SetState { task: TaskId, state: ResponseState },
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    HintExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTask { task: TaskId, input: String },
    CancelTask(TaskId),
    ClearInput,
    Render(String),
    InterruptMarker,
    Notice(&'static str),
    DroppedQueued(usize),
    ShowError(String),
    ArmExitHint,
    ClearExitHint,
    RecordHistory(String),
    OfferRecall(String),
    Exit(ExitReason),
}

/// Pure transition table for one session.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: ResponseState,
    live_task: Option<TaskId>,
    live_input: Option<String>,
    next_task: TaskId,
    queued: VecDeque<String>,
    last_interrupt_at: Option<Instant>,
    interrupt_window: Duration,
    exit_when_idle: bool,
}

impl SessionStateMachine {
    pub fn new(interrupt_window: Duration) -> Self {
        Self {
            state: ResponseState::Ready,
            live_task: None,
            live_input: None,
            next_task: 1,
            queued: VecDeque::new(),
            last_interrupt_at: None,
            interrupt_window,
            exit_when_idle: false,
        }
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn live_task(&self) -> Option<TaskId> {
        self.live_task
    }

    pub fn is_idle(&self) -> bool {
        !self.state.is_processing() && self.queued.is_empty()
    }

    /// When the "press again" hint lapses, if one is showing.
    pub fn hint_deadline(&self) -> Option<Instant> {
        self.last_interrupt_at
            .map(|armed| armed + self.interrupt_window)
    }

    pub fn apply(&mut self, trigger: Trigger, now: Instant) -> Vec<Effect> {
        let before = self.state;
        let effects = match trigger {
            Trigger::Submit(text) => self.on_submit(text),
            Trigger::Interrupt { input_pending } => self.on_interrupt(input_pending, now),
            Trigger::EndOfInput { buffered: Some(text) } => self.on_submit(text),
            Trigger::EndOfInput { buffered: None } => self.on_exit_request(),
            Trigger::Quit => {
                let mut effects = vec![Effect::ClearInput];
                effects.extend(self.on_exit_request());
                effects
            }
            Trigger::Activity => self.on_activity(),
            Trigger::TaskStarted(task) => {
                if self.live_task == Some(task) && self.state == ResponseState::Submitting {
                    self.state = ResponseState::Submitted;
                }
                Vec::new()
            }
            Trigger::StreamPart { task, text } => self.on_part(task, text),
            Trigger::SetState { task, state } => {
                self.on_external_state(task, state);
                Vec::new()
            }
            Trigger::TaskCompleted { task, outcome } => self.on_completed(task, outcome),
            Trigger::HintExpired => self.on_hint_expired(now),
        };
        if before != self.state {
            debug!(from = %before, to = %self.state, "response state changed");
        }
        effects
    }

    fn on_submit(&mut self, text: String) -> Vec<Effect> {
        let mut effects = self.on_activity();
        if text.trim().is_empty() {
            return effects;
        }
        if self.state.is_processing() {
            self.queued.push_back(text);
            effects.push(Effect::Notice(QUEUED));
            return effects;
        }
        effects.push(self.start(text));
        effects
    }

    fn start(&mut self, input: String) -> Effect {
        debug_assert!(self.live_task.is_none());
        let task = self.next_task;
        self.next_task += 1;
        self.state = ResponseState::Submitting;
        self.live_task = Some(task);
        self.live_input = Some(input.clone());
        Effect::StartTask { task, input }
    }

    fn on_interrupt(&mut self, input_pending: bool, now: Instant) -> Vec<Effect> {
        if self.state.is_processing() {
            let mut effects = Vec::new();
            if let Some(task) = self.live_task.take() {
                effects.push(Effect::CancelTask(task));
            }
            self.live_input = None;
            self.state = ResponseState::Interrupted;
            effects.push(Effect::InterruptMarker);
            if !self.queued.is_empty() {
                effects.push(Effect::DroppedQueued(self.queued.len()));
                self.queued.clear();
            }
            self.state = ResponseState::Ready;
            if self.exit_when_idle {
                effects.push(Effect::Exit(ExitReason::EndOfInput));
            }
            return effects;
        }

        if self.state == ResponseState::Error {
            self.state = ResponseState::Ready;
        }

        if input_pending {
            self.last_interrupt_at = Some(now);
            return vec![Effect::ClearInput, Effect::Notice(INPUT_CLEARED)];
        }

        let within_window = self
            .last_interrupt_at
            .is_some_and(|last| now.duration_since(last) <= self.interrupt_window);
        if within_window {
            self.last_interrupt_at = None;
            return vec![
                Effect::Notice(EXITING),
                Effect::Exit(ExitReason::Interrupted),
            ];
        }
        self.last_interrupt_at = Some(now);
        vec![Effect::ArmExitHint]
    }

    fn on_exit_request(&mut self) -> Vec<Effect> {
        if self.is_idle() {
            return vec![Effect::Exit(ExitReason::EndOfInput)];
        }
        self.exit_when_idle = true;
        Vec::new()
    }

    fn on_activity(&mut self) -> Vec<Effect> {
        if self.state == ResponseState::Error {
            self.state = ResponseState::Ready;
        }
        if self.last_interrupt_at.take().is_some() {
            return vec![Effect::ClearExitHint];
        }
        Vec::new()
    }

    fn on_part(&mut self, task: TaskId, text: String) -> Vec<Effect> {
        if self.live_task != Some(task) || !self.state.accepts_output() {
            return Vec::new();
        }
        self.state = ResponseState::Streaming;
        vec![Effect::Render(text)]
    }

    fn on_external_state(&mut self, task: TaskId, state: ResponseState) {
        if self.live_task != Some(task) || !self.state.is_processing() {
            return;
        }
        match state {
            ResponseState::Submitted if self.state == ResponseState::Submitting => {
                self.state = state;
            }
            ResponseState::Streaming => self.state = state,
            _ => debug!(requested = %state, current = %self.state, "ignored external state"),
        }
    }

    fn on_completed(&mut self, task: TaskId, outcome: TaskOutcome) -> Vec<Effect> {
        if self.live_task != Some(task) {
            debug!(task, "ignoring completion of a retired task");
            return Vec::new();
        }
        self.live_task = None;
        let input = self.live_input.take().unwrap_or_default();

        let mut effects = Vec::new();
        match outcome {
            TaskOutcome::Completed => {
                self.state = ResponseState::Ready;
                effects.push(Effect::RecordHistory(input));
            }
            TaskOutcome::Recall(text) => {
                self.state = ResponseState::Ready;
                effects.push(Effect::OfferRecall(text));
                effects.push(Effect::Notice(RECALL_HINT));
            }
            TaskOutcome::Empty => self.state = ResponseState::Ready,
            TaskOutcome::Interrupted => {
                self.state = ResponseState::Interrupted;
                effects.push(Effect::InterruptMarker);
                self.state = ResponseState::Ready;
            }
            TaskOutcome::Failed(message) => {
                self.state = ResponseState::Error;
                effects.push(Effect::ShowError(message));
            }
        }

        if let Some(next) = self.queued.pop_front() {
            self.state = ResponseState::Ready;
            effects.push(self.start(next));
        } else if self.exit_when_idle {
            effects.push(Effect::Exit(ExitReason::EndOfInput));
        }
        effects
    }

    fn on_hint_expired(&mut self, now: Instant) -> Vec<Effect> {
        match self.hint_deadline() {
            Some(deadline) if now >= deadline => {
                self.last_interrupt_at = None;
                vec![Effect::ClearExitHint]
            }
            _ => Vec::new(),
        }
    }
}

pub fn dropped_queued_notice(count: usize) -> String {
    match count {
        1 => "Dropped 1 queued input.".to_string(),
        n => format!("Dropped {n} queued inputs."),
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_INTERRUPT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(machine: &mut SessionStateMachine, input: &str, now: Instant) -> TaskId {
        let effects = machine.apply(Trigger::Submit(input.to_string()), now);
        let task = match effects.as_slice() {
            [Effect::StartTask { task, input: started }] => {
                assert_eq!(started, input);
                *task
            }
            other => panic!("expected StartTask, got {other:?}"),
        };
        machine.apply(Trigger::TaskStarted(task), now);
        task
    }

    #[test]
    fn test_submit_from_ready_starts_task() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let effects = machine.apply(Trigger::Submit("hello".to_string()), now);
        assert!(matches!(effects.as_slice(), [Effect::StartTask { .. }]));
        assert_eq!(machine.state(), ResponseState::Submitting);
        machine.apply(Trigger::TaskStarted(1), now);
        assert_eq!(machine.state(), ResponseState::Submitted);
    }

    #[test]
    fn test_blank_submit_never_starts_task() {
        let mut machine = SessionStateMachine::default();
        let effects = machine.apply(Trigger::Submit("  \n ".to_string()), Instant::now());
        assert!(effects.is_empty());
        assert_eq!(machine.state(), ResponseState::Ready);
        assert_eq!(machine.live_task(), None);
    }

    #[test]
    fn test_submit_while_processing_is_queued() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let first = started(&mut machine, "first", now);
        let effects = machine.apply(Trigger::Submit("second".to_string()), now);
        assert_eq!(effects, vec![Effect::Notice(QUEUED)]);
        assert_eq!(machine.live_task(), Some(first));
        assert_eq!(machine.queued.len(), 1);

        let effects = machine.apply(
            Trigger::TaskCompleted {
                task: first,
                outcome: TaskOutcome::Completed,
            },
            now,
        );
        assert_eq!(effects[0], Effect::RecordHistory("first".to_string()));
        assert!(matches!(
            &effects[1],
            Effect::StartTask { input, .. } if input == "second"
        ));
        assert_eq!(machine.state(), ResponseState::Submitting);
    }

    #[test]
    fn test_first_part_moves_to_streaming() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "hi", now);
        let effects = machine.apply(
            Trigger::StreamPart {
                task,
                text: "Hel".to_string(),
            },
            now,
        );
        assert_eq!(effects, vec![Effect::Render("Hel".to_string())]);
        assert_eq!(machine.state(), ResponseState::Streaming);
    }

    #[test]
    fn test_parts_before_start_or_from_old_tasks_are_dropped() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        machine.apply(Trigger::Submit("hi".to_string()), now);
        let early = machine.apply(
            Trigger::StreamPart {
                task: 1,
                text: "x".to_string(),
            },
            now,
        );
        assert!(early.is_empty());
        let foreign = machine.apply(
            Trigger::StreamPart {
                task: 99,
                text: "x".to_string(),
            },
            now,
        );
        assert!(foreign.is_empty());
    }

    #[test]
    fn test_interrupt_while_streaming_cancels_and_returns_to_ready() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "long", now);
        machine.apply(
            Trigger::StreamPart {
                task,
                text: "partial".to_string(),
            },
            now,
        );
        let effects = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );
        assert_eq!(
            effects,
            vec![Effect::CancelTask(task), Effect::InterruptMarker]
        );
        assert_eq!(machine.state(), ResponseState::Ready);
        assert_eq!(machine.live_task(), None);

        let late = machine.apply(
            Trigger::StreamPart {
                task,
                text: "late".to_string(),
            },
            now,
        );
        assert!(late.is_empty());
        let completion = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Completed,
            },
            now,
        );
        assert!(completion.is_empty());
    }

    #[test]
    fn test_interrupt_reports_dropped_queue() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "first", now);
        machine.apply(Trigger::Submit("second".to_string()), now);
        machine.apply(Trigger::Submit("third".to_string()), now);

        let effects = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );

        assert_eq!(
            effects,
            vec![
                Effect::CancelTask(task),
                Effect::InterruptMarker,
                Effect::DroppedQueued(2)
            ]
        );
        assert_eq!(machine.queued.len(), 0);
        assert_eq!(dropped_queued_notice(2), "Dropped 2 queued inputs.");
        assert_eq!(dropped_queued_notice(1), "Dropped 1 queued input.");
    }

    #[test]
    fn test_interrupt_with_pending_input_clears_it() {
        let mut machine = SessionStateMachine::default();
        let effects = machine.apply(
            Trigger::Interrupt {
                input_pending: true,
            },
            Instant::now(),
        );
        assert_eq!(
            effects,
            vec![Effect::ClearInput, Effect::Notice(INPUT_CLEARED)]
        );
        assert_eq!(machine.state(), ResponseState::Ready);
    }

    #[test]
    fn test_double_interrupt_within_window_exits() {
        let mut machine = SessionStateMachine::new(Duration::from_secs(1));
        let now = Instant::now();
        let first = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );
        assert_eq!(first, vec![Effect::ArmExitHint]);
        let second = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now + Duration::from_millis(400),
        );
        assert_eq!(
            second,
            vec![
                Effect::Notice(EXITING),
                Effect::Exit(ExitReason::Interrupted)
            ]
        );
    }

    #[test]
    fn test_slow_second_interrupt_rearms_hint() {
        let mut machine = SessionStateMachine::new(Duration::from_secs(1));
        let now = Instant::now();
        machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );
        let later = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now + Duration::from_millis(1500),
        );
        assert_eq!(later, vec![Effect::ArmExitHint]);
    }

    #[test]
    fn test_hint_expires_and_activity_disarms() {
        let mut machine = SessionStateMachine::new(Duration::from_secs(1));
        let now = Instant::now();
        machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );
        assert_eq!(machine.hint_deadline(), Some(now + Duration::from_secs(1)));
        assert!(machine
            .apply(Trigger::HintExpired, now + Duration::from_millis(10))
            .is_empty());
        assert_eq!(
            machine.apply(Trigger::HintExpired, now + Duration::from_secs(1)),
            vec![Effect::ClearExitHint]
        );
        assert_eq!(machine.hint_deadline(), None);

        machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now,
        );
        assert_eq!(
            machine.apply(Trigger::Activity, now),
            vec![Effect::ClearExitHint]
        );
        let after_typing = machine.apply(
            Trigger::Interrupt {
                input_pending: false,
            },
            now + Duration::from_millis(100),
        );
        assert_eq!(after_typing, vec![Effect::ArmExitHint]);
    }

    #[test]
    fn test_failure_sets_error_until_next_input() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "boom", now);
        let effects = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Failed("backend down".to_string()),
            },
            now,
        );
        assert_eq!(effects, vec![Effect::ShowError("backend down".to_string())]);
        assert_eq!(machine.state(), ResponseState::Error);
        machine.apply(Trigger::Activity, now);
        assert_eq!(machine.state(), ResponseState::Ready);
    }

    #[test]
    fn test_submit_after_error_starts_task() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "boom", now);
        machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Failed("x".to_string()),
            },
            now,
        );
        let effects = machine.apply(Trigger::Submit("retry".to_string()), now);
        assert!(matches!(effects.as_slice(), [Effect::StartTask { .. }]));
    }

    #[test]
    fn test_recall_and_empty_outcomes_skip_history() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "/last", now);
        let effects = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Recall("previous".to_string()),
            },
            now,
        );
        assert_eq!(
            effects,
            vec![
                Effect::OfferRecall("previous".to_string()),
                Effect::Notice(RECALL_HINT)
            ]
        );

        let task = started(&mut machine, "x", now);
        let effects = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Empty,
            },
            now,
        );
        assert!(effects.is_empty());
        assert_eq!(machine.state(), ResponseState::Ready);
    }

    #[test]
    fn test_processor_cancellation_is_not_an_error() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "x", now);
        let effects = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Interrupted,
            },
            now,
        );
        assert_eq!(effects, vec![Effect::InterruptMarker]);
        assert_eq!(machine.state(), ResponseState::Ready);
    }

    #[test]
    fn test_end_of_input_submits_or_exits() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let effects = machine.apply(
            Trigger::EndOfInput {
                buffered: Some("pending".to_string()),
            },
            now,
        );
        let task = match effects.as_slice() {
            [Effect::StartTask { task, .. }] => *task,
            other => panic!("unexpected {other:?}"),
        };
        machine.apply(Trigger::TaskStarted(task), now);

        let deferred = machine.apply(Trigger::EndOfInput { buffered: None }, now);
        assert!(deferred.is_empty());
        let effects = machine.apply(
            Trigger::TaskCompleted {
                task,
                outcome: TaskOutcome::Completed,
            },
            now,
        );
        assert_eq!(
            effects,
            vec![
                Effect::RecordHistory("pending".to_string()),
                Effect::Exit(ExitReason::EndOfInput)
            ]
        );
    }

    #[test]
    fn test_quit_discards_buffer_and_exits_when_idle() {
        let mut machine = SessionStateMachine::default();
        assert_eq!(
            machine.apply(Trigger::Quit, Instant::now()),
            vec![Effect::ClearInput, Effect::Exit(ExitReason::EndOfInput)]
        );
    }

    #[test]
    fn test_submitting_is_only_entered_from_ready() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let mut live = 0usize;
        for i in 0..5 {
            let effects = machine.apply(Trigger::Submit(format!("input {i}")), now);
            for effect in &effects {
                if let Effect::StartTask { task, .. } = effect {
                    live += 1;
                    machine.apply(Trigger::TaskStarted(*task), now);
                }
            }
            assert!(live <= 1);
        }
        assert_eq!(machine.queued.len(), 4);
    }

    #[test]
    fn test_external_state_hook_only_moves_live_task_forward() {
        let mut machine = SessionStateMachine::default();
        let now = Instant::now();
        let task = started(&mut machine, "x", now);
        machine.apply(
            Trigger::SetState {
                task,
                state: ResponseState::Streaming,
            },
            now,
        );
        assert_eq!(machine.state(), ResponseState::Streaming);
        machine.apply(
            Trigger::SetState {
                task,
                state: ResponseState::Ready,
            },
            now,
        );
        assert_eq!(machine.state(), ResponseState::Streaming);
        machine.apply(
            Trigger::SetState {
                task: task + 1,
                state: ResponseState::Submitted,
            },
            now,
        );
        assert_eq!(machine.state(), ResponseState::Streaming);
    }
}
