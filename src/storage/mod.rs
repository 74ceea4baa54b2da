//! 会话存储
//!
//! 存储后端以 trait 对象注入；进程内实现用于测试与单机演示。
//! 写入携带 TTL（后端可忽略），读取对损坏数据返回显式错误而非静默重置。

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::Session;

/// 存储层错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 后端不可达（连接失败、读写超时）
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    /// 已存在的记录无法反序列化
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
}

/// 会话存储后端
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取会话；不存在返回 Ok(None)
    async fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError>;

    /// 整体写入会话；ttl 为后端过期提示
    async fn save(&self, session: &Session, ttl: Duration) -> Result<(), StorageError>;

    async fn exists(&self, session_id: &str) -> Result<bool, StorageError>;
}

/// 进程内存储：HashMap + RwLock，忽略 TTL
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session: &Session, _ttl: Duration) -> Result<(), StorageError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StorageError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(sessions.contains_key(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemorySessionStore::new();
        assert!(!store.exists("s1").await.unwrap());
        assert!(store.load("s1").await.unwrap().is_none());

        let session = Session::new("s1");
        store
            .save(&session, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(store.exists("s1").await.unwrap());
        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.turn_count, 0);
    }
}
