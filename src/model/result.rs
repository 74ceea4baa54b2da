//! 标准化检索结果
//!
//! 所有数据源适配器（天气 / 景点 / 餐饮 / 酒店 / 航班等）的成功结果都归一为同一条记录形状，
//! 供聚合器与 Critic 使用；`raw` 保留适配器原始载荷，便于排查与下游展示。

use serde::{Deserialize, Serialize};

/// 地理坐标
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// 需要人工确认选择的类别（依次弹出中断：先景点，后餐饮）
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Attractions,
    Dining,
}

impl Category {
    /// 类别对应的检索源名称（`Session.research` 的键）
    pub fn source_name(&self) -> &'static str {
        match self {
            Category::Attractions => "attractions",
            Category::Dining => "dining",
        }
    }

    /// 人工确认顺序固定：景点在前，餐饮在后
    pub fn selection_order() -> [Category; 2] {
        [Category::Attractions, Category::Dining]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.source_name())
    }
}

/// 任意外部数据项的统一记录形状
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    /// 产出该记录的数据源名；用户自由追加的条目为 "user"
    pub source: String,
    /// 适配器原始载荷
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

impl NormalizedResult {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: None,
            coordinate: None,
            source: source.into(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_coordinate(mut self, lat: f64, lng: f64) -> Self {
        self.coordinate = Some(Coordinate { lat, lng });
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// 用户在选择环节自由追加的条目：source 固定为 "user"，id 由名称派生
    pub fn user_added(name: &str) -> Self {
        let slug: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        Self::new(format!("user-{}", slug), name.trim(), "user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_added_result() {
        let r = NormalizedResult::user_added("  A Cevicheria ");
        assert_eq!(r.source, "user");
        assert_eq!(r.name, "A Cevicheria");
        assert_eq!(r.id, "user-a-cevicheria");
        assert!(r.price.is_none());
    }

    #[test]
    fn test_category_source_names() {
        assert_eq!(Category::Attractions.source_name(), "attractions");
        assert_eq!(Category::Dining.source_name(), "dining");
        assert_eq!(
            Category::selection_order(),
            [Category::Attractions, Category::Dining]
        );
    }
}
