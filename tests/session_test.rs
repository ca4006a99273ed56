//! 会话与检查点持久化集成测试

use agentic_rag::config::AppConfig;
use agentic_rag::{create_agent, QueryRequest, RagError};
use tokio_util::sync::CancellationToken;

fn mock_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".into();
    cfg
}

#[tokio::test]
async fn test_user_thread_accumulates_history() {
    let agent = create_agent(&mock_config()).await.unwrap();

    let first = agent
        .query(QueryRequest::new("Hi there").user("u1"), CancellationToken::new())
        .await
        .unwrap();
    let second = agent
        .query(QueryRequest::new("And again").user("u1"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.thread_id, "user_u1_session");
    assert_eq!(second.thread_id, first.thread_id);
    assert!(second.message_count > first.message_count);

    let info = agent.sessions().get_info("user_u1_session").await.unwrap();
    assert_eq!(info.message_count, second.message_count);
    assert_eq!(info.checkpoint_count, 2);
    assert_eq!(info.user_id.as_deref(), Some("u1"));

    let history = agent
        .sessions()
        .get_history("user_u1_session", 10)
        .await
        .unwrap();
    let steps: Vec<u64> = history.iter().map(|c| c.step).collect();
    assert_eq!(steps, vec![2, 1]);
}

#[tokio::test]
async fn test_anonymous_queries_get_fresh_threads() {
    let agent = create_agent(&mock_config()).await.unwrap();
    let a = agent
        .query(QueryRequest::new("one"), CancellationToken::new())
        .await
        .unwrap();
    let b = agent
        .query(QueryRequest::new("two"), CancellationToken::new())
        .await
        .unwrap();
    assert_ne!(a.thread_id, b.thread_id);
    assert_eq!(agent.sessions().list(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_known_and_unknown_threads() {
    let agent = create_agent(&mock_config()).await.unwrap();
    assert!(!agent.sessions().delete("never-seen").await.unwrap());

    let resp = agent
        .query(QueryRequest::new("hello").thread("keep-me"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resp.thread_id, "keep-me");

    assert!(agent.sessions().delete("keep-me").await.unwrap());
    assert!(!agent.sessions().delete("keep-me").await.unwrap());
    assert!(agent
        .sessions()
        .conversation("keep-me", 10)
        .await
        .unwrap()
        .is_empty());

    // 删除后同一线程从空历史重新开始
    let again = agent
        .query(QueryRequest::new("hello").thread("keep-me"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.message_count, resp.message_count);
}

#[tokio::test]
async fn test_oversized_query_rejected() {
    let agent = create_agent(&mock_config()).await.unwrap();
    let err = agent
        .query(QueryRequest::new("x".repeat(1001)), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_provider_fails_at_startup() {
    let mut cfg = mock_config();
    cfg.llm.provider = "carrier-pigeon".into();
    assert!(matches!(
        create_agent(&cfg).await,
        Err(RagError::Configuration(_))
    ));
}

#[cfg(feature = "async-sqlite")]
mod sqlite {
    use std::sync::Arc;

    use super::*;
    use agentic_rag::llm::MockLlmClient;
    use agentic_rag::session::{CheckpointStore, SqliteCheckpointStore};
    use agentic_rag::workflow::WorkflowBuilder;

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("checkpoints.db");

        let first = {
            let store = Arc::new(SqliteCheckpointStore::new(&path).await.unwrap());
            let engine = WorkflowBuilder::new()
                .llm(Arc::new(MockLlmClient::new()))
                .store(store)
                .build()
                .unwrap();
            engine
                .run("t1", "first", Some("bob"), CancellationToken::new())
                .await
        };

        let store = Arc::new(SqliteCheckpointStore::new(&path).await.unwrap());
        let restored = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(restored.step, 1);
        assert_eq!(restored.state, first);
        assert_eq!(restored.metadata.user_id.as_deref(), Some("bob"));

        let engine = WorkflowBuilder::new()
            .llm(Arc::new(MockLlmClient::new()))
            .store(store.clone())
            .build()
            .unwrap();
        let second = engine
            .run("t1", "second", Some("bob"), CancellationToken::new())
            .await;

        let before = first.messages.messages();
        assert_eq!(&second.messages.messages()[..before.len()], before);
        assert_eq!(store.latest("t1").await.unwrap().unwrap().step, 2);
    }

    #[tokio::test]
    async fn test_agent_with_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = mock_config();
        cfg.storage.backend = "sqlite".into();
        cfg.storage.sqlite_path = dir.path().join("cp.db");

        let agent = create_agent(&cfg).await.unwrap();
        agent
            .query(QueryRequest::new("ping").thread("s1"), CancellationToken::new())
            .await
            .unwrap();

        let health = agent.health().await;
        assert!(health.healthy);
        assert_eq!(health.storage, "sqlite");

        let sessions = agent.sessions().list(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].thread_id, "s1");
        assert!(agent.sessions().delete("s1").await.unwrap());
        assert!(agent.sessions().list(10).await.unwrap().is_empty());
    }
}
