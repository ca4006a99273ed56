//! 会话管理
//!
//! 在 CheckpointStore 之上提供线程级视图：新建线程 ID、会话信息、检查点历史、删除与列表。
//! 这里的操作都不调用 LLM。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use super::store::{Checkpoint, CheckpointStore, StoreError};
use crate::memory::{window, Message};

/// 线程摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub thread_id: String,
    pub user_id: Option<String>,
    pub message_count: usize,
    pub checkpoint_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CheckpointStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// 生成新线程 ID；首次运行结束前不写入任何数据
    pub fn create(&self, user_id: Option<&str>) -> String {
        let thread_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(thread_id = %thread_id, user_id = ?user_id, "session created");
        thread_id
    }

    /// 没有检查点时返回空记录（message_count = 0）
    pub async fn get_info(&self, thread_id: &str) -> Result<SessionRecord, StoreError> {
        let latest = self.store.latest(thread_id).await?;
        let stats = self.store.thread_stats(thread_id).await?;
        Ok(match latest {
            Some(cp) => SessionRecord {
                thread_id: thread_id.to_string(),
                user_id: cp.metadata.user_id.clone(),
                message_count: cp.state.messages.len(),
                checkpoint_count: stats.as_ref().map(|s| s.checkpoint_count).unwrap_or(1),
                created_at: stats
                    .map(|s| s.first_created_at)
                    .unwrap_or(cp.created_at),
            },
            None => SessionRecord {
                thread_id: thread_id.to_string(),
                user_id: None,
                message_count: 0,
                checkpoint_count: 0,
                created_at: Utc::now(),
            },
        })
    }

    /// 检查点历史，最新在前
    pub async fn get_history(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        self.store.list(thread_id, limit).await
    }

    /// 幂等：线程不存在时返回 false
    pub async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        let deleted = self.store.delete(thread_id).await?;
        tracing::info!(thread_id, deleted, "session delete");
        Ok(deleted)
    }

    /// 最近活跃的线程，信息并发查询
    pub async fn list(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let ids = self.store.thread_ids(limit).await?;
        join_all(ids.iter().map(|id| self.get_info(id)))
            .await
            .into_iter()
            .collect()
    }

    /// 最新检查点中的最后 limit 条消息
    pub async fn conversation(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .store
            .latest(thread_id)
            .await?
            .map(|cp| window(cp.state.messages.messages(), limit).to_vec())
            .unwrap_or_default())
    }
}
