//! 检索子系统：fan-out/fan-in 并行调度与归一化聚合

pub mod dispatcher;
pub mod task;

pub use dispatcher::{ResearchDispatcher, RetryPolicy};
pub use task::{ResearchTask, SourceReport, SourceStatus, TaskStatus};
