//! 会话持久化：检查点存储（内存 / SQLite）与会话管理

pub mod manager;
#[cfg(feature = "async-sqlite")]
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use crate::config::StorageSection;
use crate::core::RagError;

pub use manager::{SessionManager, SessionRecord};
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteCheckpointStore;
pub use store::{
    Checkpoint, CheckpointMetadata, CheckpointStore, MemoryCheckpointStore, StoreError,
    ThreadStats,
};

/// 按配置创建检查点存储
///
/// sqlite 后端连接失败时返回 Configuration 错误（启动即失败）；
/// 未启用 async-sqlite feature 时回退到内存存储并告警。
pub async fn create_checkpoint_store(
    cfg: &StorageSection,
) -> Result<Arc<dyn CheckpointStore>, RagError> {
    match cfg.backend.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryCheckpointStore::new())),
        "sqlite" => {
            #[cfg(feature = "async-sqlite")]
            {
                let store = SqliteCheckpointStore::new(&cfg.sqlite_path)
                    .await
                    .map_err(|e| {
                        RagError::Configuration(format!(
                            "cannot open checkpoint database {}: {}",
                            cfg.sqlite_path.display(),
                            e
                        ))
                    })?;
                tracing::info!(path = %cfg.sqlite_path.display(), "Using SQLite checkpoint store");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "async-sqlite"))]
            {
                tracing::warn!("async-sqlite feature not enabled, using in-memory checkpoint store");
                Ok(Arc::new(MemoryCheckpointStore::new()))
            }
        }
        other => Err(RagError::Configuration(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_backends() {
        let cfg = StorageSection::default();
        let store = create_checkpoint_store(&cfg).await.unwrap();
        assert_eq!(store.backend(), "memory");

        let bad = StorageSection {
            backend: "mongo".into(),
            ..StorageSection::default()
        };
        assert!(matches!(
            create_checkpoint_store(&bad).await,
            Err(RagError::Configuration(_))
        ));
    }

    #[cfg(feature = "async-sqlite")]
    #[tokio::test]
    async fn test_factory_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StorageSection {
            backend: "sqlite".into(),
            sqlite_path: dir.path().join("cp.db"),
        };
        let store = create_checkpoint_store(&cfg).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
    }

    #[cfg(feature = "async-sqlite")]
    #[tokio::test]
    async fn test_factory_sqlite_unreachable_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        // 父路径是普通文件，无法建目录
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let cfg = StorageSection {
            backend: "sqlite".into(),
            sqlite_path: blocker.join("cp.db"),
        };
        assert!(matches!(
            create_checkpoint_store(&cfg).await,
            Err(RagError::Configuration(_))
        ));
    }
}
