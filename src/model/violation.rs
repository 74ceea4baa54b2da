//! Critic 违规发现与重规划记录
//!
//! 阻断性发现驱动 validating → planning 回边；劝告性发现仅呈现，不触发回路。
//! 每轮校验的发现与所采取的动作都会追加到 `Session.violation_history`，永不静默丢弃。

use serde::{Deserialize, Serialize};

/// 规则标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationRule {
    BudgetExceeded,
    TimeConflict,
    SelectionDropped,
}

impl std::fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViolationRule::BudgetExceeded => "budget-exceeded",
            ViolationRule::TimeConflict => "time-conflict",
            ViolationRule::SelectionDropped => "selection-dropped",
        };
        f.write_str(s)
    }
}

/// 严重级别：blocking 触发重规划，advisory 仅呈现
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Advisory,
}

/// 单条违规发现
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationFinding {
    pub rule: ViolationRule,
    pub severity: Severity,
    pub explanation: String,
}

impl ViolationFinding {
    pub fn blocking(rule: ViolationRule, explanation: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Blocking,
            explanation: explanation.into(),
        }
    }

    pub fn advisory(rule: ViolationRule, explanation: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Advisory,
            explanation: explanation.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// 针对一轮校验发现所采取的动作
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplanAction {
    /// 无阻断性发现，方案通过（可能携带劝告性发现）
    Accepted,
    /// 带修正指令回到 planning；attempt 为第几次重规划
    Replanned { attempt: u32 },
    /// 重规划预算耗尽，带未解决发现完成（降级，不标记失败）
    AcceptedUnresolved { explanation: String },
}

/// 一轮校验的完整记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub findings: Vec<ViolationFinding>,
    pub action: ReplanAction,
}
