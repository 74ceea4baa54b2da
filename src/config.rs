//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖
//! （双下划线表示嵌套，如 `WAYFARER__RESEARCH__MAX_CONCURRENCY=8`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::critic::CriticConfig;
use crate::research::RetryPolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub research: ResearchSection,
    #[serde(default)]
    pub critic: CriticSection,
}

/// [app] 段：应用名、重规划上限、会话 TTL
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// validating → planning 回边的次数上限
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
    /// 会话落盘 TTL（秒）
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_max_replans() -> u32 {
    3
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_replans: default_max_replans(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl AppSection {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// [research] 段：并发上限与重试参数
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchSection {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_concurrency() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl ResearchSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// [critic] 段：校验参数
#[derive(Debug, Clone, Deserialize)]
pub struct CriticSection {
    #[serde(default = "default_budget_tolerance_pct")]
    pub budget_tolerance_pct: f64,
    #[serde(default = "default_day_start_minute")]
    pub day_start_minute: u32,
    #[serde(default = "default_day_end_minute")]
    pub day_end_minute: u32,
}

fn default_budget_tolerance_pct() -> f64 {
    5.0
}

fn default_day_start_minute() -> u32 {
    480
}

fn default_day_end_minute() -> u32 {
    1320
}

impl Default for CriticSection {
    fn default() -> Self {
        Self {
            budget_tolerance_pct: default_budget_tolerance_pct(),
            day_start_minute: default_day_start_minute(),
            day_end_minute: default_day_end_minute(),
        }
    }
}

impl CriticSection {
    pub fn critic_config(&self) -> CriticConfig {
        CriticConfig {
            budget_tolerance_pct: self.budget_tolerance_pct,
            day_start_minute: self.day_start_minute,
            day_end_minute: self.day_end_minute,
        }
    }
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialized_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.research.max_concurrency, 5);
        assert_eq!(cfg.app.max_replans, 3);
        assert_eq!(cfg.critic.budget_tolerance_pct, 5.0);
        assert_eq!(cfg.critic.critic_config().day_end_minute, 1320);
        assert_eq!(cfg.app.session_ttl(), Duration::from_secs(86_400));

        let policy = cfg.research.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_millis(5_000));
    }
}
