//! Critic：对行程草案 + 预算的确定性规则校验
//!
//! 纯函数实现，不做任何 IO、不调用任何能力：同样的输入永远给出同样的发现。
//! 规则按固定顺序执行（预算上限 → 日程可行性 → 选择覆盖率），发现列表因此可复现。
//! 阻断性发现会被汇总为一条修正指令，驱动 validating → planning 回边。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    Budget, Category, DraftPlan, NormalizedResult, Preferences, ViolationFinding, ViolationRule,
};

/// 校验参数
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CriticConfig {
    /// 预算上限容差（百分比）：总额超出 ceiling * (1 + pct/100) 才算违规
    pub budget_tolerance_pct: f64,
    /// 活动时间窗起点（当日分钟数，480 = 08:00）
    pub day_start_minute: u32,
    /// 活动时间窗终点（1320 = 22:00）
    pub day_end_minute: u32,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            budget_tolerance_pct: 5.0,
            day_start_minute: 480,
            day_end_minute: 1320,
        }
    }
}

/// 按固定顺序执行全部规则，返回全部发现（不短路）
pub fn evaluate(
    config: &CriticConfig,
    preferences: &Preferences,
    selections: &BTreeMap<Category, Vec<NormalizedResult>>,
    plan: &DraftPlan,
    budget: &Budget,
) -> Vec<ViolationFinding> {
    let mut findings = Vec::new();
    check_budget_ceiling(config, preferences, budget, &mut findings);
    check_schedule_feasibility(config, plan, &mut findings);
    check_selection_coverage(selections, plan, &mut findings);
    findings
}

/// 预算上限：分项之和对照用户声明的 ceiling；超限但在容差内仅劝告
fn check_budget_ceiling(
    config: &CriticConfig,
    preferences: &Preferences,
    budget: &Budget,
    findings: &mut Vec<ViolationFinding>,
) {
    let Some(ceiling) = preferences.budget_ceiling else {
        return;
    };
    let total = budget.breakdown.total();
    let allowed = ceiling * (1.0 + config.budget_tolerance_pct / 100.0);
    if total > allowed {
        findings.push(ViolationFinding::blocking(
            ViolationRule::BudgetExceeded,
            format!(
                "estimated total {:.2} {} exceeds ceiling {:.2} (tolerance {}%)",
                total, budget.currency, ceiling, config.budget_tolerance_pct
            ),
        ));
    } else if total > ceiling {
        findings.push(ViolationFinding::advisory(
            ViolationRule::BudgetExceeded,
            format!(
                "estimated total {:.2} {} is over ceiling {:.2} but within the {}% tolerance",
                total, budget.currency, ceiling, config.budget_tolerance_pct
            ),
        ));
    }
}

/// 日程可行性：块时间区间必须正序、同一天内不得重叠；越出活动时间窗仅劝告
fn check_schedule_feasibility(
    config: &CriticConfig,
    plan: &DraftPlan,
    findings: &mut Vec<ViolationFinding>,
) {
    for day in &plan.days {
        for block in &day.blocks {
            if block.end_minute <= block.start_minute {
                findings.push(ViolationFinding::blocking(
                    ViolationRule::TimeConflict,
                    format!(
                        "day {}: '{}' ends at minute {} before it starts at {}",
                        day.day, block.name, block.end_minute, block.start_minute
                    ),
                ));
            }
            if block.start_minute < config.day_start_minute
                || block.end_minute > config.day_end_minute
            {
                findings.push(ViolationFinding::advisory(
                    ViolationRule::TimeConflict,
                    format!(
                        "day {}: '{}' falls outside the {}-{} activity window",
                        day.day, block.name, config.day_start_minute, config.day_end_minute
                    ),
                ));
            }
        }

        let mut ordered: Vec<_> = day.blocks.iter().collect();
        ordered.sort_by_key(|b| b.start_minute);
        for pair in ordered.windows(2) {
            if pair[1].start_minute < pair[0].end_minute {
                findings.push(ViolationFinding::blocking(
                    ViolationRule::TimeConflict,
                    format!(
                        "day {}: '{}' overlaps '{}'",
                        day.day, pair[0].name, pair[1].name
                    ),
                ));
            }
        }
    }
}

/// 选择覆盖率：每个已确认条目要么被安排，要么带原因登记在 unplaced；
/// 静默消失是阻断性违规，显式登记降为劝告
fn check_selection_coverage(
    selections: &BTreeMap<Category, Vec<NormalizedResult>>,
    plan: &DraftPlan,
    findings: &mut Vec<ViolationFinding>,
) {
    for category in Category::selection_order() {
        let Some(chosen) = selections.get(&category) else {
            continue;
        };
        for item in chosen {
            if plan.places(&item.id, &item.name) {
                continue;
            }
            if plan.lists_unplaced(&item.id) {
                findings.push(ViolationFinding::advisory(
                    ViolationRule::SelectionDropped,
                    format!("confirmed {} '{}' was left unplaced", category, item.name),
                ));
            } else {
                findings.push(ViolationFinding::blocking(
                    ViolationRule::SelectionDropped,
                    format!(
                        "confirmed {} '{}' is missing from the plan with no reason given",
                        category, item.name
                    ),
                ));
            }
        }
    }
}

/// 把本轮全部阻断性发现汇总为一条修正指令；无阻断性发现时返回 None
pub fn correction_directive(findings: &[ViolationFinding]) -> Option<String> {
    let blocking: Vec<String> = findings
        .iter()
        .filter(|f| f.is_blocking())
        .map(|f| format!("[{}] {}", f.rule, f.explanation))
        .collect();
    if blocking.is_empty() {
        None
    } else {
        Some(format!(
            "Revise the draft to resolve {} issue(s): {}",
            blocking.len(),
            blocking.join("; ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetBreakdown, DayPlan, PlanBlock, Severity, UnplacedSelection};

    fn prefs(ceiling: f64) -> Preferences {
        Preferences {
            budget_ceiling: Some(ceiling),
            ..Preferences::default()
        }
    }

    fn block(name: &str, start: u32, end: u32, source_id: Option<&str>) -> PlanBlock {
        PlanBlock {
            name: name.to_string(),
            category: Some(Category::Attractions),
            start_minute: start,
            end_minute: end,
            coordinate: None,
            source_id: source_id.map(String::from),
        }
    }

    fn budget_of(total: f64) -> Budget {
        Budget::new(
            total,
            BudgetBreakdown {
                lodging: total,
                ..BudgetBreakdown::default()
            },
        )
    }

    #[test]
    fn test_budget_under_ceiling_passes() {
        let plan = DraftPlan::default();
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &BTreeMap::new(),
            &plan,
            &budget_of(900.0),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_budget_within_tolerance_is_advisory() {
        let plan = DraftPlan::default();
        // 1000 < 1040 <= 1000 * 1.05
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &BTreeMap::new(),
            &plan,
            &budget_of(1040.0),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, ViolationRule::BudgetExceeded);
        assert!(!findings[0].is_blocking());
    }

    #[test]
    fn test_budget_over_tolerance_blocks() {
        let plan = DraftPlan::default();
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &BTreeMap::new(),
            &plan,
            &budget_of(1100.0),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, ViolationRule::BudgetExceeded);
        assert!(findings[0].is_blocking());
    }

    #[test]
    fn test_overlapping_blocks_block() {
        let plan = DraftPlan {
            days: vec![DayPlan {
                day: 1,
                theme: None,
                blocks: vec![
                    block("Castle", 540, 720, None),
                    block("Museum", 660, 780, None),
                ],
            }],
            unplaced: Vec::new(),
        };
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &BTreeMap::new(),
            &plan,
            &budget_of(100.0),
        );
        assert!(findings
            .iter()
            .any(|f| f.rule == ViolationRule::TimeConflict && f.is_blocking()));
    }

    #[test]
    fn test_out_of_window_is_advisory() {
        let plan = DraftPlan {
            days: vec![DayPlan {
                day: 1,
                theme: None,
                blocks: vec![block("Night walk", 1380, 1430, None)],
            }],
            unplaced: Vec::new(),
        };
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &BTreeMap::new(),
            &plan,
            &budget_of(100.0),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Advisory);
    }

    #[test]
    fn test_silent_drop_blocks_registered_drop_advises() {
        let mut selections = BTreeMap::new();
        selections.insert(
            Category::Attractions,
            vec![
                NormalizedResult::new("a1", "Castle", "attractions"),
                NormalizedResult::new("a2", "Museum", "attractions"),
                NormalizedResult::new("a3", "Aquarium", "attractions"),
            ],
        );
        let plan = DraftPlan {
            days: vec![DayPlan {
                day: 1,
                theme: None,
                blocks: vec![block("Castle", 540, 660, Some("a1"))],
            }],
            // a2 有登记，a3 静默消失
            unplaced: vec![UnplacedSelection {
                id: "a2".to_string(),
                name: "Museum".to_string(),
                reason: "no remaining slot".to_string(),
            }],
        };
        let findings = evaluate(
            &CriticConfig::default(),
            &prefs(1000.0),
            &selections,
            &plan,
            &budget_of(100.0),
        );
        let dropped: Vec<_> = findings
            .iter()
            .filter(|f| f.rule == ViolationRule::SelectionDropped)
            .collect();
        assert_eq!(dropped.len(), 2);
        assert!(dropped.iter().any(|f| !f.is_blocking() && f.explanation.contains("Museum")));
        assert!(dropped.iter().any(|f| f.is_blocking() && f.explanation.contains("Aquarium")));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut selections = BTreeMap::new();
        selections.insert(
            Category::Dining,
            vec![NormalizedResult::new("d1", "Tavern", "dining")],
        );
        let plan = DraftPlan {
            days: vec![DayPlan {
                day: 1,
                theme: None,
                blocks: vec![
                    block("Castle", 540, 720, None),
                    block("Museum", 700, 820, None),
                ],
            }],
            unplaced: Vec::new(),
        };
        let run = || {
            evaluate(
                &CriticConfig::default(),
                &prefs(100.0),
                &selections,
                &plan,
                &budget_of(500.0),
            )
        };
        let first = run();
        assert_eq!(first, run());
        // 固定顺序：预算在前，日程居中，覆盖率最后
        assert_eq!(first[0].rule, ViolationRule::BudgetExceeded);
        assert_eq!(first.last().map(|f| f.rule), Some(ViolationRule::SelectionDropped));
    }

    #[test]
    fn test_directive_covers_all_blocking_findings() {
        let findings = vec![
            ViolationFinding::blocking(ViolationRule::BudgetExceeded, "over by 200"),
            ViolationFinding::advisory(ViolationRule::TimeConflict, "late evening"),
            ViolationFinding::blocking(ViolationRule::SelectionDropped, "Museum missing"),
        ];
        let directive = correction_directive(&findings).unwrap();
        assert!(directive.contains("over by 200"));
        assert!(directive.contains("Museum missing"));
        assert!(!directive.contains("late evening"));
        assert!(directive.contains("2 issue(s)"));

        assert!(correction_directive(&[ViolationFinding::advisory(
            ViolationRule::TimeConflict,
            "late"
        )])
        .is_none());
    }
}
