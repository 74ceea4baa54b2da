//! Wayfarer - 对话式旅行规划编排引擎
//!
//! 模块划分：
//! - **capability**: 能力抽象（数据源 / 偏好提取 / 起草-预算-解释）与 Mock 实现
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 回合级错误类型
//! - **critic**: 行程草案的确定性规则校验（预算 / 日程 / 覆盖率）
//! - **model**: 领域类型（偏好、归一化结果、行程、预算、违规记录）
//! - **research**: fan-out/fan-in 并行检索调度与重试
//! - **session**: 会话状态、互斥运行时与落盘纪律
//! - **storage**: 会话存储抽象与进程内实现
//! - **workflow**: 阶段状态机与回合类型

pub mod capability;
pub mod config;
pub mod core;
pub mod critic;
pub mod model;
pub mod observability;
pub mod research;
pub mod session;
pub mod storage;
pub mod workflow;

pub use session::{SessionRuntime, TurnOutcome};
pub use workflow::{PhaseMachine, Turn};
