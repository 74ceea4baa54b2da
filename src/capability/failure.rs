//! 能力失败模型
//!
//! 所有外部调用失败归一为 CapabilityFailure：HTTP 风格分类 + retryable 标记。
//! 超出声明超时一律按 Transient 处理；Transient 在重试预算内重试，ClientError 不重试。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP 风格的失败分类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// 请求本身有问题（4xx 等价），重试无意义
    ClientError,
    /// 瞬态（限流、5xx 等价、超时），可重试
    Transient,
    /// 无法归类
    Unknown,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureClass::ClientError => "client-error",
            FailureClass::Transient => "transient",
            FailureClass::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 能力调用失败
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("capability failure ({class}): {message}")]
pub struct CapabilityFailure {
    pub class: FailureClass,
    pub retryable: bool,
    pub message: String,
}

impl CapabilityFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            retryable: true,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::ClientError,
            retryable: false,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Unknown,
            retryable: false,
            message: message.into(),
        }
    }

    /// 超出声明超时：按 Transient 处理
    pub fn timeout(what: &str, limit: Duration) -> Self {
        Self::transient(format!("{} timed out after {:?}", what, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        let f = CapabilityFailure::timeout("weather", Duration::from_secs(5));
        assert_eq!(f.class, FailureClass::Transient);
        assert!(f.retryable);
        assert!(f.message.contains("weather"));
    }

    #[test]
    fn test_permanent_not_retryable() {
        let f = CapabilityFailure::permanent("invalid api key");
        assert_eq!(f.class, FailureClass::ClientError);
        assert!(!f.retryable);
    }
}
