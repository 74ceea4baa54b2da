//! 会话子系统：状态、互斥运行时与落盘纪律

pub mod runtime;
pub mod state;

pub use runtime::{SessionRuntime, TurnOutcome};
pub use state::{FailureCause, Session};
