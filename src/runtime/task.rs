use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::processor::{ProcessRequest, Processor};
use crate::app::ResponseSink;
use crate::error::ProcessError;
use crate::state::{TaskId, TaskOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskId,
    pub outcome: TaskOutcome,
}

/// One processor invocation running beside the input loop.
pub struct ProcessTask {
    id: TaskId,
    token: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ProcessTask {
    /// Spawns `processor` under a child of `parent`. The outcome is sent on
    /// `reports` before the done signal fires.
    pub fn start(
        parent: &CancellationToken,
        id: TaskId,
        input: String,
        processor: Arc<dyn Processor>,
        sink: ResponseSink,
        reports: mpsc::UnboundedSender<TaskReport>,
    ) -> Self {
        let token = parent.child_token();
        let (done_tx, done) = watch::channel(false);
        let request = ProcessRequest {
            input,
            cancel: token.clone(),
            sink,
        };
        let task_token = token.clone();

        tokio::spawn(async move {
            let call = AssertUnwindSafe(processor.process(request)).catch_unwind();
            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(ProcessError::Cancelled),
                result = call => result.unwrap_or_else(|_| {
                    Err(ProcessError::Failed(anyhow::anyhow!("processor panicked")))
                }),
            };
            let outcome = classify(result, task_token.is_cancelled());
            debug!(task = id, ?outcome, "process task finished");
            let _ = reports.send(TaskReport { task: id, outcome });
            let _ = done_tx.send(true);
        });

        debug!(task = id, "process task started");
        Self { id, token, done }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(task = self.id, "cancelling process task");
        }
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    pub async fn done(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

/// Maps a processor result to an outcome. A cancelled token always wins,
/// even over a successful return.
pub fn classify(result: Result<(), ProcessError>, cancelled: bool) -> TaskOutcome {
    if cancelled {
        return TaskOutcome::Interrupted;
    }
    match result {
        Ok(()) => TaskOutcome::Completed,
        Err(ProcessError::UseLastMessage(text)) => TaskOutcome::Recall(text),
        Err(ProcessError::EmptyInput) => TaskOutcome::Empty,
        Err(ProcessError::Cancelled) => TaskOutcome::Interrupted,
        Err(ProcessError::Failed(err)) => TaskOutcome::Failed(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sink() -> ResponseSink {
        ResponseSink::capture().0
    }

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(classify(Ok(()), false), TaskOutcome::Completed);
        assert_eq!(classify(Ok(()), true), TaskOutcome::Interrupted);
        assert_eq!(
            classify(Err(ProcessError::UseLastMessage("x".to_string())), false),
            TaskOutcome::Recall("x".to_string())
        );
        assert_eq!(
            classify(Err(ProcessError::EmptyInput), false),
            TaskOutcome::Empty
        );
        assert_eq!(
            classify(Err(ProcessError::Cancelled), false),
            TaskOutcome::Interrupted
        );
        assert_eq!(
            classify(Err(anyhow::anyhow!("boom").into()), false),
            TaskOutcome::Failed("boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_task_reports_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let processor: Arc<dyn Processor> =
            Arc::new(|_request: ProcessRequest| async { Ok::<(), ProcessError>(()) });
        let task = ProcessTask::start(
            &CancellationToken::new(),
            7,
            "hi".to_string(),
            processor,
            sink(),
            tx,
        );
        task.done().await;
        assert!(task.is_finished());
        assert_eq!(
            rx.recv().await,
            Some(TaskReport {
                task: 7,
                outcome: TaskOutcome::Completed
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_wins_over_late_success() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let processor: Arc<dyn Processor> = Arc::new(|_request: ProcessRequest| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<(), ProcessError>(())
        });
        let task = ProcessTask::start(
            &CancellationToken::new(),
            1,
            "slow".to_string(),
            processor,
            sink(),
            tx,
        );
        task.cancel();
        task.cancel();
        task.done().await;
        assert_eq!(rx.recv().await.map(|r| r.outcome), Some(TaskOutcome::Interrupted));
    }

    #[tokio::test]
    async fn test_cancelled_before_return_is_interrupted_even_if_ok() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let processor: Arc<dyn Processor> = Arc::new(|request: ProcessRequest| async move {
            // Ignores the token and returns success after it fired.
            request.cancel.cancelled().await;
            Ok::<(), ProcessError>(())
        });
        let task = ProcessTask::start(
            &CancellationToken::new(),
            2,
            "x".to_string(),
            processor,
            sink(),
            tx,
        );
        task.cancel();
        task.done().await;
        assert_eq!(rx.recv().await.map(|r| r.outcome), Some(TaskOutcome::Interrupted));
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let parent = CancellationToken::new();
        let processor: Arc<dyn Processor> = Arc::new(|request: ProcessRequest| async move {
            request.cancel.cancelled().await;
            Err(ProcessError::Cancelled)
        });
        let task = ProcessTask::start(&parent, 3, "x".to_string(), processor, sink(), tx);
        parent.cancel();
        task.done().await;
        assert!(task.is_finished());
        assert_eq!(rx.recv().await.map(|r| r.outcome), Some(TaskOutcome::Interrupted));
    }

    #[tokio::test]
    async fn test_panicking_processor_is_reported_as_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let processor: Arc<dyn Processor> = Arc::new(|_request: ProcessRequest| async {
            if true {
                panic!("processor bug");
            }
            Ok::<(), ProcessError>(())
        });
        let task = ProcessTask::start(
            &CancellationToken::new(),
            4,
            "x".to_string(),
            processor,
            sink(),
            tx,
        );
        task.done().await;
        assert_eq!(
            rx.recv().await.map(|r| r.outcome),
            Some(TaskOutcome::Failed("processor panicked".to_string()))
        );
    }
}
