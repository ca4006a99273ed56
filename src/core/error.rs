//! 错误类型
//!
//! RagError 是面向调用方的错误分类：Configuration 阻止 Agent 构建；Validation 在引擎运行前拒绝请求；
//! Retrieval / Llm / Storage 在运行中产生，是否致命由所在节点决定（见 workflow::nodes）。

use thiserror::Error;

use crate::llm::LlmError;
use crate::session::StoreError;
use crate::workflow::WorkflowError;

#[derive(Error, Debug)]
pub enum RagError {
    /// 启动时持久化或必需服务不可用
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 查询为空或超长
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Run cancelled")]
    Cancelled,
}
