pub mod processor;
pub mod task;

pub use processor::{ProcessRequest, Processor};
pub use task::{ProcessTask, TaskReport};
