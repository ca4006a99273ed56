//! 异步 SQLite 检查点存储
//!
//! 使用 sqlx 提供完全异步的数据库操作；状态与元数据以 JSON 文本存储。
//! 需要启用 `async-sqlite` feature。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::store::{Checkpoint, CheckpointMetadata, CheckpointStore, StoreError, ThreadStats};
use crate::workflow::WorkflowState;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// 打开（必要时创建）数据库文件并建表
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                step INTEGER NOT NULL,
                state TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (thread_id, step)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id, step)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint, StoreError> {
    let step: i64 = row.try_get("step")?;
    let state: String = row.try_get("state")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Checkpoint {
        thread_id: row.try_get("thread_id")?,
        step: u64::try_from(step).map_err(|_| StoreError::Corrupt(format!("negative step {}", step)))?,
        state: serde_json::from_str::<WorkflowState>(&state)?,
        metadata: serde_json::from_str::<CheckpointMetadata>(&metadata)?,
        created_at: parse_time(&created_at)?,
    })
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        metadata: CheckpointMetadata,
    ) -> Result<Checkpoint, StoreError> {
        let state_json = serde_json::to_string(state)?;
        let metadata_json = serde_json::to_string(&metadata)?;
        // 定宽微秒时间戳，保证按字符串比较即按时间比较
        let created_at = Utc::now().trunc_subsecs(6);

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT COALESCE(MAX(step), 0) AS last_step FROM checkpoints WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await?;
        let last_step: i64 = row.try_get("last_step")?;
        let step = last_step + 1;

        sqlx::query(
            "INSERT INTO checkpoints (thread_id, step, state, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(step)
        .bind(&state_json)
        .bind(&metadata_json)
        .bind(created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(thread_id, step, "checkpoint saved");
        Ok(Checkpoint {
            thread_id: thread_id.to_string(),
            step: step as u64,
            state: state.clone(),
            metadata,
            created_at,
        })
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query(
            "SELECT thread_id, step, state, metadata, created_at FROM checkpoints
             WHERE thread_id = ? ORDER BY step DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn list(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>, StoreError> {
        let rows = sqlx::query(
            "SELECT thread_id, step, state, metadata, created_at FROM checkpoints
             WHERE thread_id = ? ORDER BY step DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_checkpoint).collect()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn thread_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT thread_id FROM checkpoints GROUP BY thread_id ORDER BY MAX(id) DESC LIMIT ?",
        )
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("thread_id").map_err(StoreError::from))
            .collect()
    }

    async fn thread_stats(&self, thread_id: &str) -> Result<Option<ThreadStats>, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, MIN(created_at) AS first_created_at FROM checkpoints WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        if n == 0 {
            return Ok(None);
        }
        let first: String = row.try_get("first_created_at")?;
        Ok(Some(ThreadStats {
            checkpoint_count: n as u64,
            first_created_at: parse_time(&first)?,
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
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
    async fn test_roundtrip_and_steps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(dir.path().join("cp.db")).await.unwrap();

        let meta = CheckpointMetadata { user_id: Some("u1".into()) };
        let first = store.put("t1", &state_with(2), meta.clone()).await.unwrap();
        let second = store.put("t1", &state_with(4), meta.clone()).await.unwrap();
        assert_eq!((first.step, second.step), (1, 2));

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.state, second.state);
        assert_eq!(latest.metadata, meta);

        let listed: Vec<u64> = store.list("t1", 10).await.unwrap().iter().map(|c| c.step).collect();
        assert_eq!(listed, vec![2, 1]);
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cp.db");
        {
            let store = SqliteCheckpointStore::new(&path).await.unwrap();
            store.put("t", &state_with(3), CheckpointMetadata::default()).await.unwrap();
        }
        let store = SqliteCheckpointStore::new(&path).await.unwrap();
        let latest = store.latest("t").await.unwrap().unwrap();
        assert_eq!(latest.state.messages.len(), 3);
        let next = store.put("t", &state_with(5), CheckpointMetadata::default()).await.unwrap();
        assert_eq!(next.step, 2);
    }

    #[tokio::test]
    async fn test_delete_threads_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(dir.path().join("cp.db")).await.unwrap();
        store.put("a", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        store.put("b", &state_with(1), CheckpointMetadata::default()).await.unwrap();
        store.put("b", &state_with(2), CheckpointMetadata::default()).await.unwrap();

        assert_eq!(store.thread_ids(10).await.unwrap(), vec!["b", "a"]);
        let stats = store.thread_stats("b").await.unwrap().unwrap();
        assert_eq!(stats.checkpoint_count, 2);
        assert!(store.thread_stats("zzz").await.unwrap().is_none());

        assert!(store.delete("b").await.unwrap());
        assert!(!store.delete("b").await.unwrap());
        assert_eq!(store.thread_ids(10).await.unwrap(), vec!["a"]);
    }
}
