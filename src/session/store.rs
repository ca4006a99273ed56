//! 检查点存储抽象层
//!
//! 每次完整运行结束后写入一个检查点；线程的当前状态即 step 最大的检查点。
//! 提供内存与 SQLite（feature `async-sqlite`）两种实现。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::workflow::WorkflowState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
}

#[cfg(feature = "async-sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub user_id: Option<String>,
}

/// 一个线程在某一 step 的状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub step: u64,
    pub state: WorkflowState,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

/// 线程统计：检查点数量与首个检查点时间
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadStats {
    pub checkpoint_count: u64,
    pub first_created_at: DateTime<Utc>,
}

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 追加检查点，step = 当前最大 step + 1（首个为 1）
    async fn put(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        metadata: CheckpointMetadata,
    ) -> Result<Checkpoint, StoreError>;

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// 按 step 倒序，最多 limit 条
    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>, StoreError>;

    /// 删除线程全部检查点；原本不存在时返回 false
    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// 去重的线程 ID，最近写入的在前
    async fn thread_ids(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    async fn thread_stats(&self, thread_id: &str) -> Result<Option<ThreadStats>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

#[derive(Default)]
struct MemoryInner {
    threads: HashMap<String, Vec<Checkpoint>>,
    /// 线程 → 最近一次写入序号，用于 thread_ids 排序
    last_write: HashMap<String, u64>,
    seq: u64,
}

/// 内存检查点存储（进程退出即丢失）
#[derive(Default)]
pub struct MemoryCheckpointStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        metadata: CheckpointMetadata,
    ) -> Result<Checkpoint, StoreError> {
        let mut inner = self.inner.write().await;
        inner.seq += 1;
        let seq = inner.seq;
        inner.last_write.insert(thread_id.to_string(), seq);

        let history = inner.threads.entry(thread_id.to_string()).or_default();
        let step = history.last().map(|c| c.step).unwrap_or(0) + 1;
        let checkpoint = Checkpoint {
            thread_id: thread_id.to_string(),
            step,
            state: state.clone(),
            metadata,
            created_at: Utc::now(),
        };
        history.push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.threads.get(thread_id).and_then(|h| h.last().cloned()))
    }

    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .threads
            .get(thread_id)
            .map(|h| h.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_write.remove(thread_id);
        Ok(inner
            .threads
            .remove(thread_id)
            .map(|h| !h.is_empty())
            .unwrap_or(false))
    }

    async fn thread_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<(&String, &u64)> = inner.last_write.iter().collect();
        ids.sort_by(|a, b| b.1.cmp(a.1));
        Ok(ids.into_iter().take(limit).map(|(id, _)| id.clone()).collect())
    }

    async fn thread_stats(&self, thread_id: &str) -> Result<Option<ThreadStats>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.threads.get(thread_id).and_then(|h| {
            h.first().map(|first| ThreadStats {
                checkpoint_count: h.len() as u64,
                first_created_at: first.created_at,
            })
        }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    fn state_with(n: usize) -> WorkflowState {
        let mut s = WorkflowState::new("q", 3);
        for i in 0..n {
            s.messages.push(Message::user(format!("m{}", i)));
        }
        s
    }

    #[tokio::test]
    async fn test_put_assigns_increasing_steps() {
        let store = MemoryCheckpointStore::new();
        let a = store.put("t1", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        let b = store.put("t1", &state_with(2), CheckpointMetadata::default()).await.unwrap();
        let c = store.put("t2", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        assert_eq!((a.step, b.step, c.step), (1, 2, 1));

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let store = MemoryCheckpointStore::new();
        for i in 1..=4 {
            store.put("t", &state_with(i), CheckpointMetadata::default()).await.unwrap();
        }
        let steps: Vec<u64> = store.list("t", 3).await.unwrap().iter().map(|c| c.step).collect();
        assert_eq!(steps, vec![4, 3, 2]);
        assert!(store.list("missing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_thread_ids() {
        let store = MemoryCheckpointStore::new();
        store.put("a", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        store.put("b", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        store.put("a", &state_with(2), CheckpointMetadata::default()).await.unwrap();

        assert_eq!(store.thread_ids(10).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.thread_ids(1).await.unwrap(), vec!["a"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.latest("a").await.unwrap().is_none());
        assert_eq!(store.thread_ids(10).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_thread_stats() {
        let store = MemoryCheckpointStore::new();
        assert!(store.thread_stats("t").await.unwrap().is_none());
        let first = store.put("t", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        store.put("t", &state_with(2), CheckpointMetadata::default()).await.unwrap();
        let stats = store.thread_stats("t").await.unwrap().unwrap();
        assert_eq!(stats.checkpoint_count, 2);
        assert_eq!(stats.first_created_at, first.created_at);
    }
}
