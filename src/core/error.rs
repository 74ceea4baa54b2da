//! 回合级错误
//!
//! 能力失败不会走到这里——它们被吸收进会话状态（phase=failed + FailureCause）。
//! 只有两类情况以 Err 浮出：调用方违反交互协议，以及存储这类无法降级的基础设施故障。

use thiserror::Error;

use crate::storage::StorageError;

/// 处理一个回合时向调用方暴露的错误
#[derive(Debug, Error)]
pub enum TurnError {
    /// 回合不符合当前会话状态（错误类别的应答、终态会话的新回合等）。
    /// 会话状态保持原样，同一回合重发得到同样的拒绝。
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// 无法降级的基础设施故障
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<StorageError> for TurnError {
    fn from(e: StorageError) -> Self {
        TurnError::Fatal(e.to_string())
    }
}
