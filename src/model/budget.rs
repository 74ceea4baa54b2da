//! 预算
//!
//! 预算能力的结构化输出：期望值 / 上下界区间 + 分项拆解。Critic 的预算上限规则
//! 以分项之和对照用户声明的 budget_ceiling。

use serde::{Deserialize, Serialize};

/// 预算分项（单位与 `Budget.currency` 一致）
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub lodging: f64,
    pub dining: f64,
    pub activities: f64,
    pub transport: f64,
}

impl BudgetBreakdown {
    pub fn total(&self) -> f64 {
        self.lodging + self.dining + self.activities + self.transport
    }
}

/// 成本汇总
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    pub currency: String,
    pub expected: f64,
    pub low: f64,
    pub high: f64,
    pub breakdown: BudgetBreakdown,
}

impl Budget {
    pub fn new(expected: f64, breakdown: BudgetBreakdown) -> Self {
        Self {
            currency: "USD".to_string(),
            expected,
            low: (expected * 0.85 * 100.0).round() / 100.0,
            high: (expected * 1.15 * 100.0).round() / 100.0,
            breakdown,
        }
    }
}
