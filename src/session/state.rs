//! 会话状态
//!
//! 单个会话的全部持久化状态。每个被接受的回合都会推进 `turn_count` 并整体落盘，
//! 被拒绝的回合不留任何痕迹。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Budget, Category, DraftPlan, NormalizedResult, Preferences, ViolationRecord};
use crate::research::SourceReport;
use crate::workflow::{Interrupt, Phase};

/// 会话进入 failed 的原因
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureCause {
    /// 出错环节（extract / draft / budget / explain）
    pub stage: String,
    pub message: String,
}

/// 会话完整状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub phase: Phase,
    /// 已接受回合数；只增不减
    pub turn_count: u64,
    pub preferences: Preferences,
    /// 每数据源一份报告（含失败源的显式状态）
    #[serde(default)]
    pub research: BTreeMap<String, SourceReport>,
    /// 挂起的人工确认中断；同一时刻至多一个
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_interrupt: Option<Interrupt>,
    /// 已确认的选择（按类别）
    #[serde(default)]
    pub selections: BTreeMap<Category, Vec<NormalizedResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<DraftPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    /// 每轮校验的发现与动作，按时间追加
    #[serde(default)]
    pub violation_history: Vec<ViolationRecord>,
    /// 已执行的重规划次数
    #[serde(default)]
    pub replan_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            phase: Phase::Collecting,
            turn_count: 0,
            preferences: Preferences::default(),
            research: BTreeMap::new(),
            pending_interrupt: None,
            selections: BTreeMap::new(),
            plan: None,
            budget: None,
            violation_history: Vec::new(),
            replan_count: 0,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }
}
