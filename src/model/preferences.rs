//! 旅行偏好
//!
//! 偏好提取能力每回合产出 PartialPreferences，按「字段级 last-write-wins」合并进 Preferences：
//! 本回合给出的字段覆盖旧值，未提及的字段保持不变。必填字段集固定，集齐后才进入检索阶段。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 出行日期：可以是确定日期，也可以显式表示「还没定」（该字段即视为已收集）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartDate {
    Decided(NaiveDate),
    Undecided,
}

/// 已收集的结构化偏好；每个字段在被收集前均为空
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub destination: Option<String>,
    pub travel_days: Option<u32>,
    pub start_date: Option<StartDate>,
    pub travelers: Option<u32>,
    pub budget_ceiling: Option<f64>,
    pub lodging_pref: Option<String>,
    pub transport_pref: Option<String>,
    // 以下为可选补充项，不阻塞阶段推进
    pub cuisine_pref: Option<String>,
    pub activity_pref: Option<String>,
    pub origin_city: Option<String>,
}

impl Preferences {
    /// 尚缺的必填字段名（为空即可进入检索）
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.destination.is_none() {
            missing.push("destination");
        }
        if self.travel_days.is_none() {
            missing.push("travel_days");
        }
        if self.start_date.is_none() {
            missing.push("start_date");
        }
        if self.travelers.is_none() {
            missing.push("travelers");
        }
        if self.budget_ceiling.is_none() {
            missing.push("budget_ceiling");
        }
        if self.lodging_pref.is_none() {
            missing.push("lodging_pref");
        }
        if self.transport_pref.is_none() {
            missing.push("transport_pref");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// 偏好提取能力单回合的产出：仅包含本回合明确给出的字段
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartialPreferences {
    pub destination: Option<String>,
    pub travel_days: Option<u32>,
    pub start_date: Option<StartDate>,
    pub travelers: Option<u32>,
    pub budget_ceiling: Option<f64>,
    pub lodging_pref: Option<String>,
    pub transport_pref: Option<String>,
    pub cuisine_pref: Option<String>,
    pub activity_pref: Option<String>,
    pub origin_city: Option<String>,
}

impl PartialPreferences {
    /// 字段级 last-write-wins 合并：返回新的 Preferences，不改写入参
    pub fn apply_to(&self, known: &Preferences) -> Preferences {
        Preferences {
            destination: self.destination.clone().or_else(|| known.destination.clone()),
            travel_days: self.travel_days.or(known.travel_days),
            start_date: self.start_date.or(known.start_date),
            travelers: self.travelers.or(known.travelers),
            budget_ceiling: self.budget_ceiling.or(known.budget_ceiling),
            lodging_pref: self.lodging_pref.clone().or_else(|| known.lodging_pref.clone()),
            transport_pref: self
                .transport_pref
                .clone()
                .or_else(|| known.transport_pref.clone()),
            cuisine_pref: self.cuisine_pref.clone().or_else(|| known.cuisine_pref.clone()),
            activity_pref: self
                .activity_pref
                .clone()
                .or_else(|| known.activity_pref.clone()),
            origin_city: self.origin_city.clone().or_else(|| known.origin_city.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_until_complete() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.missing_fields().len(), 7);
        assert!(!prefs.is_complete());

        prefs.destination = Some("Lisbon".to_string());
        prefs.travel_days = Some(3);
        prefs.start_date = Some(StartDate::Undecided);
        prefs.travelers = Some(2);
        prefs.budget_ceiling = Some(1500.0);
        prefs.lodging_pref = Some("hotel".to_string());
        assert_eq!(prefs.missing_fields(), vec!["transport_pref"]);

        prefs.transport_pref = Some("flight".to_string());
        assert!(prefs.is_complete());
    }

    #[test]
    fn test_merge_last_write_wins_per_field() {
        let known = Preferences {
            destination: Some("Lisbon".to_string()),
            travelers: Some(2),
            ..Preferences::default()
        };

        // 本回合只改 travelers，destination 未提及必须保留
        let partial = PartialPreferences {
            travelers: Some(4),
            budget_ceiling: Some(2000.0),
            ..PartialPreferences::default()
        };
        let merged = partial.apply_to(&known);
        assert_eq!(merged.destination.as_deref(), Some("Lisbon"));
        assert_eq!(merged.travelers, Some(4));
        assert_eq!(merged.budget_ceiling, Some(2000.0));
        // 入参不被改写
        assert_eq!(known.travelers, Some(2));
    }

    #[test]
    fn test_merge_explicit_update_overwrites() {
        let known = Preferences {
            destination: Some("Lisbon".to_string()),
            ..Preferences::default()
        };
        let partial = PartialPreferences {
            destination: Some("Porto".to_string()),
            ..PartialPreferences::default()
        };
        assert_eq!(
            partial.apply_to(&known).destination.as_deref(),
            Some("Porto")
        );
    }
}
