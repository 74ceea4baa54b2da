//! 行程草案
//!
//! 起草能力的结构化输出：按天组织的时间块。无法安排的已确认选择必须进入 `unplaced`
//! 并附原因——静默丢弃会被 Critic 判为阻断性违规。

use serde::{Deserialize, Serialize};

use crate::model::result::{Category, Coordinate};

/// 一天内的一个时间块；时间以当日分钟数表示（如 540 = 09:00）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanBlock {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub start_minute: u32,
    pub end_minute: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    /// 对应选中条目的 id；用于选择覆盖率校验
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// 单日安排
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub blocks: Vec<PlanBlock>,
}

/// 未能安排进行程的已确认选择（必须给出原因）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnplacedSelection {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// 行程草案：规划阶段完成前为空
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DraftPlan {
    pub days: Vec<DayPlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unplaced: Vec<UnplacedSelection>,
}

impl DraftPlan {
    /// 某个选中条目是否被安排进任意时间块（按 source_id 匹配，退化为按名称）
    pub fn places(&self, id: &str, name: &str) -> bool {
        self.days.iter().flat_map(|d| d.blocks.iter()).any(|b| {
            b.source_id.as_deref() == Some(id) || b.name == name
        })
    }

    /// 某个选中条目是否在 unplaced 中登记
    pub fn lists_unplaced(&self, id: &str) -> bool {
        self.unplaced.iter().any(|u| u.id == id)
    }
}
