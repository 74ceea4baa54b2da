//! 检索调度器
//!
//! 每个配置的数据源建一个 ResearchTask，受 Semaphore 限制并发 fan-out；
//! 瞬态失败按「指数退避 + 抖动」独立重试，永久失败只终止该任务。fan-in 等待
//! 全部任务到达终态后聚合为每源 SourceReport——部分源失败的数据照常保留，
//! 带显式状态而非静默省略。每次尝试输出结构化审计日志（JSON）。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Semaphore;

use crate::capability::{call_with_timeout, DataSource, ResearchQuery};
use crate::research::task::{ResearchTask, SourceReport, TaskStatus};

/// 重试策略：尝试上限与退避参数
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时长：base * 2^(attempt-1) + jitter(0..base)，封顶 max_backoff
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter_ms = rand::thread_rng().gen_range(0..=self.base_backoff.as_millis() as u64);
        let delay = exp + Duration::from_millis(jitter_ms);
        delay.min(self.max_backoff)
    }
}

/// 检索调度器：持有数据源集合、并发上限与重试策略
pub struct ResearchDispatcher {
    sources: Vec<Arc<dyn DataSource>>,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ResearchDispatcher {
    pub fn new(sources: Vec<Arc<dyn DataSource>>, max_concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            sources,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            retry,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// fan-out/fan-in：所有任务到达终态后返回每源报告；本函数自身从不失败
    pub async fn dispatch(&self, query: &ResearchQuery) -> BTreeMap<String, SourceReport> {
        let mut handles = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let task = ResearchTask::new(source.name(), query.clone(), self.retry.max_attempts);
            let source = Arc::clone(source);
            let semaphore = Arc::clone(&self.semaphore);
            let retry = self.retry.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ())
                    .ok();
                run_task(source, task, retry).await
            }));
        }

        let joined = futures_util::future::join_all(handles).await;

        let mut reports = BTreeMap::new();
        for (outcome, source) in joined.into_iter().zip(self.sources.iter()) {
            let report = match outcome {
                Ok((name, report)) => {
                    debug_assert_eq!(name, source.name());
                    report
                }
                // spawn 的任务 panic：按该源失败记录，不影响其余源
                Err(e) => SourceReport::failed(format!("research task aborted: {}", e)),
            };
            reports.insert(source.name().to_string(), report);
        }
        reports
    }
}

/// 单任务执行：重试循环到终态
async fn run_task(
    source: Arc<dyn DataSource>,
    mut task: ResearchTask,
    retry: RetryPolicy,
) -> (String, SourceReport) {
    let started = Instant::now();
    let report = loop {
        task.attempt_count += 1;
        let result = call_with_timeout(
            &task.source_name,
            source.timeout(),
            source.fetch(&task.query),
        )
        .await;

        match result {
            Ok(results) => {
                task.status = TaskStatus::Success;
                break SourceReport::success(results);
            }
            Err(failure) if !(failure.retryable && source.idempotent()) => {
                task.status = TaskStatus::Failed;
                break SourceReport::failed(failure.to_string());
            }
            Err(failure) if task.attempt_count >= task.max_attempts => {
                task.status = TaskStatus::Exhausted;
                break SourceReport::exhausted(failure.to_string());
            }
            Err(failure) => {
                let delay = retry.backoff_delay(task.attempt_count);
                tracing::debug!(
                    source = %task.source_name,
                    attempt = task.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "transient research failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    let audit = serde_json::json!({
        "event": "research_audit",
        "source": task.source_name,
        "status": task.status,
        "attempts": task.attempt_count,
        "items": report.results.len(),
        "duration_ms": started.elapsed().as_millis() as u64,
    });
    tracing::info!(audit = %audit.to_string(), "research");

    (task.source_name, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        CapabilityFailure, FailingSource, FlakySource, ResearchQuery, StaticSource,
    };
    use crate::model::{NormalizedResult, Preferences};
    use crate::research::task::SourceStatus;

    fn query() -> ResearchQuery {
        ResearchQuery {
            preferences: Preferences::default(),
        }
    }

    fn items(source: &str, names: &[&str]) -> Vec<NormalizedResult> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| NormalizedResult::new(format!("{}-{}", source, i), *n, source))
            .collect()
    }

    #[tokio::test]
    async fn test_all_sources_aggregate() {
        let dispatcher = ResearchDispatcher::new(
            vec![
                Arc::new(StaticSource::new("attractions", items("attractions", &["a", "b"]))),
                Arc::new(StaticSource::new("dining", items("dining", &["c"]))),
            ],
            5,
            RetryPolicy::default(),
        );

        let reports = dispatcher.dispatch(&query()).await;
        assert_eq!(reports.len(), 2);
        assert!(reports["attractions"].is_success());
        assert_eq!(reports["attractions"].results.len(), 2);
        assert!(reports["dining"].is_success());
    }

    #[tokio::test]
    async fn test_within_source_order_preserved() {
        let names = ["first", "second", "third", "fourth"];
        let dispatcher = ResearchDispatcher::new(
            vec![Arc::new(StaticSource::new("attractions", items("attractions", &names)))],
            1,
            RetryPolicy::default(),
        );

        let reports = dispatcher.dispatch(&query()).await;
        let got: Vec<&str> = reports["attractions"]
            .results
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(got, names);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        // 失败 2 次后成功，预算 3 次：应标记成功
        let flaky = Arc::new(FlakySource::new("hotels", 2, items("hotels", &["h1"])));
        let dispatcher = ResearchDispatcher::new(
            vec![flaky.clone()],
            5,
            RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
        );

        let reports = dispatcher.dispatch(&query()).await;
        assert!(reports["hotels"].is_success());
        assert_eq!(reports["hotels"].results.len(), 1);
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let flaky = Arc::new(FlakySource::new("hotels", 10, Vec::new()));
        let dispatcher = ResearchDispatcher::new(
            vec![flaky.clone()],
            5,
            RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
        );

        let reports = dispatcher.dispatch(&query()).await;
        assert!(matches!(
            reports["hotels"].status,
            SourceStatus::Exhausted { .. }
        ));
        assert!(reports["hotels"].results.is_empty());
        // 恰好用满重试预算
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        // 一个源永久失败，其余源正常聚合
        let dispatcher = ResearchDispatcher::new(
            vec![
                Arc::new(StaticSource::new("attractions", items("attractions", &["a"]))),
                Arc::new(FailingSource::new(
                    "flights",
                    CapabilityFailure::permanent("route not served"),
                )),
                Arc::new(StaticSource::new("weather", items("weather", &["day1"]))),
            ],
            5,
            RetryPolicy::default(),
        );

        let reports = dispatcher.dispatch(&query()).await;
        assert!(reports["attractions"].is_success());
        assert!(reports["weather"].is_success());
        match &reports["flights"].status {
            SourceStatus::Failed { error } => assert!(error.contains("route not served")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let failing = Arc::new(FailingSource::new(
            "flights",
            CapabilityFailure::permanent("bad request"),
        ));
        let dispatcher =
            ResearchDispatcher::new(vec![failing.clone()], 5, RetryPolicy::default());

        dispatcher.dispatch(&query()).await;
        assert_eq!(failing.calls(), 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(700),
        };
        // 抖动上界为 base，因此第 1 次 <= 200ms，且永不超过封顶值
        for attempt in 1..=6 {
            let d = policy.backoff_delay(attempt);
            assert!(d <= Duration::from_millis(700));
        }
        assert!(policy.backoff_delay(1) >= Duration::from_millis(100));
    }
}
