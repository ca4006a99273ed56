//! Agent 门面
//!
//! 供 CLI（以及任何上层前端）调用：校验请求、解析线程 ID、跑工作流并整理为 QueryResponse。
//! create_agent 按配置一次性构建所有协作方并注入引擎。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::RagError;
use crate::llm::create_llm_from_config;
use crate::retrieval::{create_web_search_from_config, InMemoryVectorStore, VectorRetriever};
use crate::session::{create_checkpoint_store, SessionManager};
use crate::tools::{default_registry, ToolExecutor};
use crate::workflow::{Source, WorkflowBuilder, WorkflowEngine, WorkflowState};

/// 查询最大字符数
pub const MAX_QUERY_CHARS: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), RagError> {
        let n = self.query.chars().count();
        if self.query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }
        if n > MAX_QUERY_CHARS {
            return Err(RagError::Validation(format!(
                "query is {} characters, limit is {}",
                n, MAX_QUERY_CHARS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub thread_id: String,
    pub original_query: String,
    pub rewritten_query: String,
    pub needs_retrieval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_source: Option<Source>,
    pub answer_is_relevant: bool,
    pub iteration: u32,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn from_state(thread_id: String, state: WorkflowState) -> Self {
        Self {
            message_count: state.messages.len(),
            answer: state.answer,
            thread_id,
            original_query: state.original_query,
            rewritten_query: state.rewritten_query,
            needs_retrieval: state.needs_retrieval,
            selected_source: state.selected_source,
            answer_is_relevant: state.answer_is_relevant,
            iteration: state.iteration,
            error: state.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub llm: String,
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

pub struct RagAgent {
    engine: Arc<WorkflowEngine>,
    sessions: SessionManager,
}

impl RagAgent {
    pub fn new(engine: WorkflowEngine) -> Self {
        let sessions = SessionManager::new(engine.store().clone());
        Self {
            engine: Arc::new(engine),
            sessions,
        }
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 线程 ID：显式给定 > 按用户固定为 user_<id>_session > 新 UUID
    pub fn resolve_thread_id(&self, req: &QueryRequest) -> String {
        match (&req.thread_id, &req.user_id) {
            (Some(t), _) if !t.trim().is_empty() => t.clone(),
            (_, Some(u)) if !u.trim().is_empty() => format!("user_{}_session", u),
            _ => self.sessions.create(None),
        }
    }

    /// 仅校验失败返回 Err；运行期错误体现在 QueryResponse.error
    pub async fn query(
        &self,
        req: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, RagError> {
        req.validate()?;
        let thread_id = self.resolve_thread_id(&req);
        tracing::info!(thread_id = %thread_id, "processing query");

        let state = self
            .engine
            .run(&thread_id, &req.query, req.user_id.as_deref(), cancel)
            .await;
        Ok(QueryResponse::from_state(thread_id, state))
    }

    pub async fn health(&self) -> HealthStatus {
        let store = self.engine.store();
        let storage_error = store.health_check().await.err().map(|e| e.to_string());
        HealthStatus {
            healthy: storage_error.is_none(),
            llm: self.engine.collaborators().llm.name().to_string(),
            storage: store.backend().to_string(),
            storage_error,
        }
    }
}

/// 按配置创建 Agent（向量库为空的内存实现）
pub async fn create_agent(cfg: &AppConfig) -> Result<RagAgent, RagError> {
    create_agent_with_retriever(cfg, Arc::new(InMemoryVectorStore::new())).await
}

/// 按配置创建 Agent，使用调用方提供的向量检索
pub async fn create_agent_with_retriever(
    cfg: &AppConfig,
    vector: Arc<dyn VectorRetriever>,
) -> Result<RagAgent, RagError> {
    let llm = create_llm_from_config(cfg)?;
    let store = create_checkpoint_store(&cfg.storage).await?;
    let web = create_web_search_from_config(&cfg.web_search);
    let tools = ToolExecutor::new(default_registry(), cfg.retrieval.tool_timeout_secs);

    let engine = WorkflowBuilder::from_config(cfg)
        .llm(llm)
        .vector_retriever(vector)
        .web_search(Arc::from(web))
        .tools(Arc::new(tools))
        .store(store)
        .build()?;
    Ok(RagAgent::new(engine))
}
