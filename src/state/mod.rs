pub mod history;
pub mod machine;
pub mod response;

pub use history::{HistoryStore, LoadStatus};
pub use machine::{Effect, ExitReason, SessionStateMachine, TaskId, TaskOutcome, Trigger};
pub use response::ResponseState;
