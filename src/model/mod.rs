//! 领域数据模型：标准化检索结果、偏好、行程草案、预算、违规发现

pub mod budget;
pub mod plan;
pub mod preferences;
pub mod result;
pub mod violation;

pub use budget::{Budget, BudgetBreakdown};
pub use plan::{DayPlan, DraftPlan, PlanBlock, UnplacedSelection};
pub use preferences::{PartialPreferences, Preferences, StartDate};
pub use result::{Category, Coordinate, NormalizedResult};
pub use violation::{
    ReplanAction, Severity, ViolationFinding, ViolationRecord, ViolationRule,
};
