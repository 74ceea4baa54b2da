//! 能力抽象
//!
//! 编排器从不直接调用具体适配器，只经由这些 trait 对象：
//! - DataSource：一个外部数据源（天气 / 景点 / 餐饮 / 酒店 / 航班 …）
//! - PreferenceExtractor：对话消息 -> 本回合偏好增量
//! - TripDrafter：LLM 背书的起草 / 预算 / 违规解释能力
//!
//! 每个能力声明自己的超时与幂等性；超时到期统一转为 Transient 失败（不阻塞调用方）。

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::failure::CapabilityFailure;
use crate::model::{
    Budget, Category, DraftPlan, NormalizedResult, PartialPreferences, Preferences,
    ViolationFinding,
};
use crate::research::SourceReport;

/// 一次检索批次的查询载荷：适配器各取所需字段
#[derive(Clone, Debug)]
pub struct ResearchQuery {
    pub preferences: Preferences,
}

/// 外部数据源适配器
#[async_trait]
pub trait DataSource: Send + Sync {
    /// 源名称，同时作为 `Session.research` 的键
    fn name(&self) -> &str;

    /// 单次调用允许的最长耗时；超出按 Transient 失败处理
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// 副作用幂等才允许重试；声明 false 的源失败后不重试
    fn idempotent(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        query: &ResearchQuery,
    ) -> Result<Vec<NormalizedResult>, CapabilityFailure>;
}

/// 偏好提取能力：消息 + 已知偏好 -> 本回合增量
#[async_trait]
pub trait PreferenceExtractor: Send + Sync {
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn extract(
        &self,
        message: &str,
        known: &Preferences,
    ) -> Result<PartialPreferences, CapabilityFailure>;
}

/// 起草能力的输入：偏好 + 已确认选择 + 检索数据 + 可选修正指令
#[derive(Clone, Debug)]
pub struct DraftInput {
    pub preferences: Preferences,
    pub selections: BTreeMap<Category, Vec<NormalizedResult>>,
    pub research: BTreeMap<String, SourceReport>,
    /// Critic 给出的修正指令（重规划回合才有）
    pub directive: Option<String>,
}

/// 起草 / 预算 / 解释能力（通常由同一个 LLM 后端实现）
#[async_trait]
pub trait TripDrafter: Send + Sync {
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// 起草按天组织的行程
    async fn draft_itinerary(&self, input: &DraftInput) -> Result<DraftPlan, CapabilityFailure>;

    /// 基于行程与检索到的价格估算预算
    async fn estimate_budget(
        &self,
        preferences: &Preferences,
        plan: &DraftPlan,
        research: &BTreeMap<String, SourceReport>,
    ) -> Result<Budget, CapabilityFailure>;

    /// 将违规发现转为面向用户的说明文本
    async fn explain_violations(
        &self,
        findings: &[ViolationFinding],
    ) -> Result<String, CapabilityFailure>;
}

/// 对能力调用施加声明式超时；到期转为 Transient 失败
pub async fn call_with_timeout<T>(
    what: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T, CapabilityFailure>>,
) -> Result<T, CapabilityFailure> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityFailure::timeout(what, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::failure::FailureClass;

    #[tokio::test]
    async fn test_call_with_timeout_passthrough() {
        let out = call_with_timeout("fast", Duration::from_secs(1), async { Ok(42u32) }).await;
        assert_eq!(out.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_call_with_timeout_elapsed() {
        let out: Result<u32, _> =
            call_with_timeout("slow", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        let err = out.unwrap_err();
        assert_eq!(err.class, FailureClass::Transient);
        assert!(err.retryable);
    }
}
