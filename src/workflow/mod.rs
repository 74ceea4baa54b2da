//! 工作流子系统：阶段状态机与回合类型

pub mod machine;
pub mod types;

pub use machine::PhaseMachine;
pub use types::{Interrupt, InterruptKind, Phase, SelectionResponse, Turn};
