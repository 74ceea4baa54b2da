//! 工作流类型：阶段、回合输入与人工确认中断

use serde::{Deserialize, Serialize};

use crate::model::{Category, NormalizedResult};

/// 会话阶段
///
/// 推进方向固定：collecting → researching → awaiting_selection → planning →
/// budgeting → validating → complete；唯一回边是 validating → planning（重规划）。
/// complete / failed 为终态，终态会话拒绝一切后续回合。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collecting,
    Researching,
    AwaitingSelection,
    Planning,
    Budgeting,
    Validating,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Collecting => "collecting",
            Phase::Researching => "researching",
            Phase::AwaitingSelection => "awaiting_selection",
            Phase::Planning => "planning",
            Phase::Budgeting => "budgeting",
            Phase::Validating => "validating",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一个用户回合：自由文本消息，或对挂起中断的选择应答
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    Message { text: String },
    Selection { response: SelectionResponse },
}

/// 对一次选择中断的应答
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionResponse {
    /// 必须与挂起中断的类别一致
    pub category: Category,
    /// 从候选集中挑选的条目 id；未知 id 按协议违例拒绝
    pub chosen_ids: Vec<String>,
    /// 用户自由追加的条目名（候选集之外）
    #[serde(default)]
    pub custom_additions: Vec<String>,
}

/// 中断种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterruptKind {
    /// 从候选集中挑选（允许追加自定义条目）
    SelectFromSet,
}

/// 挂起的人工确认中断；同一时刻一个会话至多一个
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interrupt {
    pub kind: InterruptKind,
    pub category: Category,
    pub prompt: String,
    pub candidates: Vec<NormalizedResult>,
    /// 是否允许候选集之外的自由追加
    pub allow_custom_addition: bool,
}

impl Interrupt {
    pub fn select_from(category: Category, candidates: Vec<NormalizedResult>) -> Self {
        Self {
            kind: InterruptKind::SelectFromSet,
            category,
            prompt: format!(
                "Please pick the {} you want to include (reply with their ids); you can also add your own.",
                category
            ),
            candidates,
            allow_custom_addition: true,
        }
    }
}
