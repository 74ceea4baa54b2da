//! 会话运行时
//!
//! 对外的唯一入口：按 session_id 互斥地处理回合。加载 → 状态机推进 → 先落盘
//! 再应答；被拒绝的回合（协议违例、过期回合）不写任何状态，重发得到同样结果。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::core::TurnError;
use crate::session::state::Session;
use crate::storage::SessionStore;
use crate::workflow::{PhaseMachine, Turn};

/// 一个被接受回合的结果
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// 面向用户的应答文本
    pub reply: String,
    /// 落盘后的会话快照（含挂起中断，若有）
    pub session: Session,
}

/// 会话运行时：状态机 + 存储 + 按会话互斥
pub struct SessionRuntime {
    machine: PhaseMachine,
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    // 锁仲裁表：每个 session_id 一把 tokio 锁，回合处理全程持有
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionRuntime {
    pub fn new(machine: PhaseMachine, store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            machine,
            store,
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// 处理一个回合。
    ///
    /// `observed_turn_count` 由调用方携带其最后看到的 turn_count：与当前值不符
    /// 说明该回合基于过期状态发出，按协议违例拒绝（不写状态）。传 None 跳过该检查。
    pub async fn handle_turn(
        &self,
        session_id: &str,
        observed_turn_count: Option<u64>,
        turn: Turn,
    ) -> Result<TurnOutcome, TurnError> {
        let lock = self.lock_for(session_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.process_turn(session_id, observed_turn_count, turn).await
        };
        self.evict_idle_lock(session_id, lock);
        result
    }

    async fn process_turn(
        &self,
        session_id: &str,
        observed_turn_count: Option<u64>,
        turn: Turn,
    ) -> Result<TurnOutcome, TurnError> {
        let mut session = self
            .store
            .load(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));

        if let Some(observed) = observed_turn_count {
            if observed != session.turn_count {
                return Err(TurnError::ProtocolViolation(format!(
                    "stale turn: session is at turn {}, caller observed {}",
                    session.turn_count, observed
                )));
            }
        }

        let reply = self.machine.apply(&mut session, turn).await?;

        session.turn_count += 1;
        session.updated_at = Utc::now();
        // 先写后答：落盘失败时不向用户确认任何推进
        self.store.save(&session, self.ttl).await?;

        tracing::info!(
            session = %session.session_id,
            turn = session.turn_count,
            phase = %session.phase,
            "turn accepted"
        );
        Ok(TurnOutcome { reply, session })
    }

    /// 只读快照（不取会话锁）
    pub async fn snapshot(&self, session_id: &str) -> Result<Option<Session>, TurnError> {
        Ok(self.store.load(session_id).await?)
    }

    fn lock_for(&self, session_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, TurnError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| TurnError::Fatal(format!("lock arena poisoned: {}", e)))?;
        Ok(Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        ))
    }

    /// 回合结束后回收无等待者的会话锁，仲裁表不随会话数无界增长。
    /// 强引用恰为 2（表中一份 + 本地一份）说明没有并发等待者，可安全移除；
    /// 之后到达的回合会经 `lock_for` 重建一把新锁。
    fn evict_idle_lock(&self, session_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            if Arc::strong_count(&lock) == 2 {
                locks.remove(session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{GreedyDrafter, MockExtractor};
    use crate::critic::CriticConfig;
    use crate::research::{ResearchDispatcher, RetryPolicy};
    use crate::storage::InMemorySessionStore;
    use crate::workflow::Phase;

    fn runtime() -> Arc<SessionRuntime> {
        let machine = PhaseMachine::new(
            Arc::new(MockExtractor),
            Arc::new(GreedyDrafter),
            ResearchDispatcher::new(vec![], 5, RetryPolicy::default()),
            CriticConfig::default(),
            3,
        );
        Arc::new(SessionRuntime::new(
            machine,
            Arc::new(InMemorySessionStore::new()),
            Duration::from_secs(3600),
        ))
    }

    fn msg(text: &str) -> Turn {
        Turn::Message {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_turn_count_advances_and_persists() {
        let rt = runtime();
        let id = SessionRuntime::generate_session_id();

        let first = rt
            .handle_turn(&id, None, msg("destination=Lisbon"))
            .await
            .unwrap();
        assert_eq!(first.session.turn_count, 1);
        assert_eq!(first.session.phase, Phase::Collecting);

        let second = rt.handle_turn(&id, None, msg("days=3")).await.unwrap();
        assert_eq!(second.session.turn_count, 2);

        let snapshot = rt.snapshot(&id).await.unwrap().unwrap();
        assert_eq!(snapshot.turn_count, 2);
        assert_eq!(snapshot.preferences.destination.as_deref(), Some("Lisbon"));
        assert_eq!(snapshot.preferences.travel_days, Some(3));
    }

    #[tokio::test]
    async fn test_stale_turn_rejected_without_mutation() {
        let rt = runtime();
        let id = "stale-test";

        rt.handle_turn(id, Some(0), msg("destination=Lisbon"))
            .await
            .unwrap();

        // 基于已过期的 turn_count=0 重发：拒绝且不写状态
        let err = rt
            .handle_turn(id, Some(0), msg("days=3"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ProtocolViolation(_)));
        let snapshot = rt.snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.turn_count, 1);
        assert_eq!(snapshot.preferences.travel_days, None);

        rt.handle_turn(id, Some(1), msg("days=3")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_turns_serialize_per_session() {
        let rt = runtime();
        let id = "concurrent-test";

        let a = {
            let rt = Arc::clone(&rt);
            tokio::spawn(async move { rt.handle_turn(id, None, msg("destination=Lisbon")).await })
        };
        let b = {
            let rt = Arc::clone(&rt);
            tokio::spawn(async move { rt.handle_turn(id, None, msg("days=3")).await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // 两个回合都被接受且互斥执行：计数恰为 2，两次更新都在
        let snapshot = rt.snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.turn_count, 2);
        assert_eq!(snapshot.preferences.destination.as_deref(), Some("Lisbon"));
        assert_eq!(snapshot.preferences.travel_days, Some(3));
    }

    #[tokio::test]
    async fn test_lock_arena_drains_after_turns() {
        let rt = runtime();

        rt.handle_turn("a", None, msg("destination=Lisbon"))
            .await
            .unwrap();
        rt.handle_turn("b", None, msg("destination=Porto"))
            .await
            .unwrap();
        // 被拒绝的回合同样要归还锁
        rt.handle_turn("a", Some(7), msg("days=3")).await.unwrap_err();

        // 无在途回合时仲裁表为空，不随会话数累积
        assert_eq!(rt.locks.lock().unwrap().len(), 0);

        // 回收后的会话照常继续
        rt.handle_turn("a", Some(1), msg("days=3")).await.unwrap();
        let snapshot = rt.snapshot("a").await.unwrap().unwrap();
        assert_eq!(snapshot.turn_count, 2);
        assert_eq!(rt.locks.lock().unwrap().len(), 0);
    }
}
