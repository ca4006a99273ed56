//! agentic-rag - 检索增强问答工作流引擎
//!
//! 模块划分：
//! - **agent**: 门面（请求校验、线程 ID 解析、结果整理）与按配置构建
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 只追加的会话日志与上下文窗口
//! - **observability**: 日志初始化
//! - **retrieval**: 向量检索与 Web 搜索
//! - **session**: 检查点存储与会话管理
//! - **tools**: 计算器、日期时间工具与执行器
//! - **workflow**: 状态机（改写 → 判断 → 选源 → 检索 → 生成 → 评估）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod retrieval;
pub mod session;
pub mod tools;
pub mod workflow;

pub use agent::{create_agent, QueryRequest, QueryResponse, RagAgent};
pub use crate::core::RagError;
