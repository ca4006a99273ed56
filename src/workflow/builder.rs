//! 工作流构建器
//!
//! 提供流畅的 API 组装 WorkflowEngine；build() 校验参数与转移图。
//! 只有 LLM 是必需的，其余协作方缺省为：空的内存向量库、占位 Web 搜索、默认工具集、内存检查点存储。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::retrieval::{InMemoryVectorStore, PlaceholderSearch, VectorRetriever, WebSearch};
use crate::session::{CheckpointStore, MemoryCheckpointStore};
use crate::tools::{default_registry, ToolExecutor};
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::nodes::{Collaborators, RunSettings};
use crate::workflow::types::WorkflowError;

#[derive(Default)]
pub struct WorkflowBuilder {
    llm: Option<Arc<dyn LlmClient>>,
    vector: Option<Arc<dyn VectorRetriever>>,
    web: Option<Arc<dyn WebSearch>>,
    tools: Option<Arc<ToolExecutor>>,
    store: Option<Arc<dyn CheckpointStore>>,
    graph: Option<WorkflowGraph>,
    settings: RunSettings,
    tool_timeout_secs: u64,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            tool_timeout_secs: 30,
            ..Default::default()
        }
    }

    /// 从配置读取运行参数（不含协作方）
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new()
            .max_iterations(cfg.workflow.max_iterations)
            .max_context_messages(cfg.workflow.max_context_messages)
            .call_timeout(Duration::from_secs(cfg.workflow.call_timeout_secs))
            .top_k(cfg.retrieval.top_k)
            .web_max_results(cfg.web_search.max_results)
            .tool_timeout_secs(cfg.retrieval.tool_timeout_secs)
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn vector_retriever(mut self, vector: Arc<dyn VectorRetriever>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 替换转移图（默认 WorkflowGraph::agentic_rag）
    pub fn graph(mut self, graph: WorkflowGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn max_iterations(mut self, n: u32) -> Self {
        self.settings.max_iterations = n;
        self
    }

    pub fn max_context_messages(mut self, n: usize) -> Self {
        self.settings.max_context_messages = n;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.settings.call_timeout = timeout;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.settings.top_k = k;
        self
    }

    pub fn web_max_results(mut self, n: usize) -> Self {
        self.settings.web_max_results = n;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<WorkflowEngine, WorkflowError> {
        let invalid = |msg: &str| WorkflowError::InvalidConfiguration(msg.to_string());

        let llm = self.llm.ok_or_else(|| invalid("llm client is required"))?;
        if self.settings.max_iterations < 1 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        if self.settings.max_context_messages < 1 {
            return Err(invalid("max_context_messages must be at least 1"));
        }
        if self.settings.call_timeout.is_zero() {
            return Err(invalid("call_timeout must be positive"));
        }
        if self.settings.top_k < 1 {
            return Err(invalid("top_k must be at least 1"));
        }

        let graph = match self.graph {
            Some(g) => g,
            None => WorkflowGraph::agentic_rag()?,
        };
        let tool_timeout_secs = self.tool_timeout_secs.max(1);
        let collaborators = Collaborators {
            llm,
            vector: self
                .vector
                .unwrap_or_else(|| Arc::new(InMemoryVectorStore::new())),
            web: self.web.unwrap_or_else(|| Arc::new(PlaceholderSearch)),
            tools: self
                .tools
                .unwrap_or_else(|| Arc::new(ToolExecutor::new(default_registry(), tool_timeout_secs))),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));

        Ok(WorkflowEngine::new(graph, collaborators, store, self.settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_requires_llm() {
        let err = WorkflowBuilder::new().build().err().unwrap();
        assert!(matches!(err, WorkflowError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let err = WorkflowBuilder::new()
            .llm(Arc::new(MockLlmClient::new()))
            .max_iterations(0)
            .build()
            .err()
            .unwrap();
        assert_eq!(
            err,
            WorkflowError::InvalidConfiguration("max_iterations must be at least 1".into())
        );
    }

    #[test]
    fn test_from_config() {
        let mut cfg = AppConfig::default();
        cfg.workflow.max_iterations = 7;
        cfg.retrieval.top_k = 2;
        let engine = WorkflowBuilder::from_config(&cfg)
            .llm(Arc::new(MockLlmClient::new()))
            .build()
            .unwrap();
        assert_eq!(engine.settings().max_iterations, 7);
        assert_eq!(engine.settings().top_k, 2);
        assert_eq!(engine.store().backend(), "memory");
    }
}
