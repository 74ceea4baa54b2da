//! 检索任务与每源报告
//!
//! ResearchTask 是调度期间的瞬态描述符，批次聚合完成后即丢弃；
//! 留在 Session 里的是每源一份的 SourceReport（显式状态 + 有序结果）。

use serde::{Deserialize, Serialize};

use crate::capability::ResearchQuery;
use crate::model::NormalizedResult;

/// 任务状态：pending 为非终态，其余三个为终态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Success,
    /// 永久失败（ClientError 或源不允许重试），仅终止本任务
    Failed,
    /// 瞬态失败耗尽重试预算
    Exhausted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// 单次调度中的任务描述符
#[derive(Clone, Debug)]
pub struct ResearchTask {
    pub source_name: String,
    pub query: ResearchQuery,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub status: TaskStatus,
}

impl ResearchTask {
    pub fn new(source_name: impl Into<String>, query: ResearchQuery, max_attempts: u32) -> Self {
        Self {
            source_name: source_name.into(),
            query,
            attempt_count: 0,
            max_attempts: max_attempts.max(1),
            status: TaskStatus::Pending,
        }
    }
}

/// 聚合后的每源状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Failed { error: String },
    Exhausted { error: String },
}

/// `Session.research` 中每个数据源一份：显式状态 + 保留适配器返回顺序的结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    pub results: Vec<NormalizedResult>,
}

impl SourceReport {
    pub fn success(results: Vec<NormalizedResult>) -> Self {
        Self {
            status: SourceStatus::Success,
            results,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Failed {
                error: error.into(),
            },
            results: Vec::new(),
        }
    }

    pub fn exhausted(error: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Exhausted {
                error: error.into(),
            },
            results: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SourceStatus::Success)
    }
}
