//! Mock 能力实现（测试与演示用，无需任何外部 API）
//!
//! - MockExtractor：解析 "key=value; key=value" 形式的消息为偏好增量
//! - StaticSource / FailingSource / FlakySource：固定结果 / 固定失败 / 先败后成的数据源
//! - GreedyDrafter：确定性的贪心起草与逐项累加预算

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::capability::failure::CapabilityFailure;
use crate::capability::traits::{
    DataSource, DraftInput, PreferenceExtractor, ResearchQuery, TripDrafter,
};
use crate::model::{
    Budget, BudgetBreakdown, Category, DayPlan, DraftPlan, NormalizedResult, PartialPreferences,
    PlanBlock, Preferences, StartDate, UnplacedSelection, ViolationFinding,
};
use crate::research::SourceReport;

/// 关键词式偏好提取：按 ';' 分段、'=' 取键值；无法识别的段忽略
#[derive(Debug, Default)]
pub struct MockExtractor;

#[async_trait]
impl PreferenceExtractor for MockExtractor {
    async fn extract(
        &self,
        message: &str,
        _known: &Preferences,
    ) -> Result<PartialPreferences, CapabilityFailure> {
        let mut partial = PartialPreferences::default();
        for segment in message.split(';') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "destination" => partial.destination = Some(value.to_string()),
                "days" | "travel_days" => {
                    partial.travel_days = value.parse().ok();
                }
                "date" | "start_date" => {
                    if value.eq_ignore_ascii_case("not decided") {
                        partial.start_date = Some(StartDate::Undecided);
                    } else if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                        partial.start_date = Some(StartDate::Decided(d));
                    }
                }
                "travelers" | "people" => {
                    partial.travelers = value.parse().ok();
                }
                "budget" | "budget_ceiling" => {
                    partial.budget_ceiling = value.trim_start_matches('$').parse().ok();
                }
                "lodging" => partial.lodging_pref = Some(value.to_string()),
                "transport" => partial.transport_pref = Some(value.to_string()),
                "cuisine" => partial.cuisine_pref = Some(value.to_string()),
                "activities" | "activity" => partial.activity_pref = Some(value.to_string()),
                "origin" => partial.origin_city = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(partial)
    }
}

/// 固定结果数据源
pub struct StaticSource {
    name: String,
    results: Vec<NormalizedResult>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, results: Vec<NormalizedResult>) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }
}

#[async_trait]
impl DataSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _query: &ResearchQuery,
    ) -> Result<Vec<NormalizedResult>, CapabilityFailure> {
        Ok(self.results.clone())
    }
}

/// 每次调用都返回同一个失败的数据源
pub struct FailingSource {
    name: String,
    failure: CapabilityFailure,
    calls: AtomicU32,
}

impl FailingSource {
    pub fn new(name: impl Into<String>, failure: CapabilityFailure) -> Self {
        Self {
            name: name.into(),
            failure,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _query: &ResearchQuery,
    ) -> Result<Vec<NormalizedResult>, CapabilityFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

/// 先瞬态失败 fail_times 次、之后成功的数据源（重试路径测试用）
pub struct FlakySource {
    name: String,
    fail_times: u32,
    results: Vec<NormalizedResult>,
    calls: AtomicU32,
}

impl FlakySource {
    pub fn new(name: impl Into<String>, fail_times: u32, results: Vec<NormalizedResult>) -> Self {
        Self {
            name: name.into(),
            fail_times,
            results,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FlakySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _query: &ResearchQuery,
    ) -> Result<Vec<NormalizedResult>, CapabilityFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            Err(CapabilityFailure::transient("simulated rate limit"))
        } else {
            Ok(self.results.clone())
        }
    }
}

// 贪心起草的日程参数
const FIRST_BLOCK_START: u32 = 540; // 09:00
const BLOCK_MINUTES: u32 = 120;
const BLOCK_GAP: u32 = 30;
const MAX_BLOCKS_PER_DAY: usize = 4;
const DEFAULT_NIGHTLY_RATE: f64 = 120.0;
const DEFAULT_ACTIVITY_PRICE: f64 = 40.0;
const DEFAULT_MEAL_PRICE: f64 = 35.0;

/// 确定性起草器：把已确认选择轮转铺进各天，预算逐项累加检索价格
#[derive(Debug, Default)]
pub struct GreedyDrafter;

impl GreedyDrafter {
    fn effective_price(item: &NormalizedResult, category: Category) -> f64 {
        item.price.unwrap_or(match category {
            Category::Attractions => DEFAULT_ACTIVITY_PRICE,
            Category::Dining => DEFAULT_MEAL_PRICE,
        })
    }

    /// 在任意成功的源里按 id 查价格
    fn price_of(id: &str, research: &BTreeMap<String, SourceReport>) -> Option<f64> {
        research
            .values()
            .filter(|r| r.is_success())
            .flat_map(|r| r.results.iter())
            .find(|item| item.id == id)
            .and_then(|item| item.price)
    }

    fn min_price(research: &BTreeMap<String, SourceReport>, source: &str) -> Option<f64> {
        research
            .get(source)
            .filter(|r| r.is_success())
            .and_then(|r| {
                r.results
                    .iter()
                    .filter_map(|item| item.price)
                    .min_by(|a, b| a.total_cmp(b))
            })
    }
}

#[async_trait]
impl TripDrafter for GreedyDrafter {
    async fn draft_itinerary(&self, input: &DraftInput) -> Result<DraftPlan, CapabilityFailure> {
        let day_count = input.preferences.travel_days.unwrap_or(1).max(1);

        let mut items: Vec<(Category, NormalizedResult)> = Vec::new();
        for category in Category::selection_order() {
            if let Some(selected) = input.selections.get(&category) {
                items.extend(selected.iter().cloned().map(|r| (category, r)));
            }
        }

        let mut unplaced = Vec::new();

        // 修正指令：丢弃当前最贵的一项以压低成本（登记进 unplaced，不静默丢弃）
        if input.directive.is_some() && !items.is_empty() {
            let (idx, _) = items
                .iter()
                .enumerate()
                .map(|(i, (c, r))| (i, Self::effective_price(r, *c)))
                .fold((0, f64::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
            let (_, dropped) = items.remove(idx);
            unplaced.push(UnplacedSelection {
                id: dropped.id.clone(),
                name: dropped.name.clone(),
                reason: "dropped to satisfy correction directive".to_string(),
            });
        }

        let mut days: Vec<DayPlan> = (1..=day_count)
            .map(|day| DayPlan {
                day,
                theme: None,
                blocks: Vec::new(),
            })
            .collect();

        for (idx, (category, item)) in items.into_iter().enumerate() {
            let day_idx = idx / MAX_BLOCKS_PER_DAY;
            let slot = (idx % MAX_BLOCKS_PER_DAY) as u32;
            if day_idx >= days.len() {
                unplaced.push(UnplacedSelection {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    reason: "no remaining slot in schedule".to_string(),
                });
                continue;
            }
            let start = FIRST_BLOCK_START + slot * (BLOCK_MINUTES + BLOCK_GAP);
            days[day_idx].blocks.push(PlanBlock {
                name: item.name.clone(),
                category: Some(category),
                start_minute: start,
                end_minute: start + BLOCK_MINUTES,
                coordinate: item.coordinate,
                source_id: Some(item.id.clone()),
            });
        }

        for day in &mut days {
            if day.blocks.is_empty() {
                day.theme = Some("Flex day".to_string());
            }
        }

        Ok(DraftPlan { days, unplaced })
    }

    async fn estimate_budget(
        &self,
        preferences: &Preferences,
        plan: &DraftPlan,
        research: &BTreeMap<String, SourceReport>,
    ) -> Result<Budget, CapabilityFailure> {
        let nights = preferences.travel_days.unwrap_or(1).max(1) as f64;
        let travelers = preferences.travelers.unwrap_or(1).max(1) as f64;

        let lodging = Self::min_price(research, "hotels").unwrap_or(DEFAULT_NIGHTLY_RATE) * nights;
        let transport = Self::min_price(research, "flights").unwrap_or(0.0) * travelers;

        let mut activities = 0.0;
        let mut dining = 0.0;
        for block in plan.days.iter().flat_map(|d| d.blocks.iter()) {
            let listed = block
                .source_id
                .as_deref()
                .and_then(|id| Self::price_of(id, research));
            match block.category {
                Some(Category::Attractions) => {
                    activities += listed.unwrap_or(DEFAULT_ACTIVITY_PRICE) * travelers;
                }
                Some(Category::Dining) => {
                    dining += listed.unwrap_or(DEFAULT_MEAL_PRICE) * travelers;
                }
                None => {}
            }
        }

        let breakdown = BudgetBreakdown {
            lodging,
            dining,
            activities,
            transport,
        };
        Ok(Budget::new(breakdown.total(), breakdown))
    }

    async fn explain_violations(
        &self,
        findings: &[ViolationFinding],
    ) -> Result<String, CapabilityFailure> {
        let details: Vec<String> = findings
            .iter()
            .map(|f| format!("{}: {}", f.rule, f.explanation))
            .collect();
        Ok(format!(
            "The drafted plan has {} outstanding issue(s): {}",
            findings.len(),
            details.join("; ")
        ))
    }
}
