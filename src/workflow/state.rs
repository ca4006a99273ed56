//! 工作流状态
//!
//! 节点只读取 WorkflowState 并返回 StateUpdate（部分更新）；合并规则：标量字段覆盖，messages 按序追加。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::{Message, MessageLog};

/// 检索来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    VectorDatabase,
    ToolsApi,
    WebSearch,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::VectorDatabase => "vector_database",
            Source::ToolsApi => "tools_api",
            Source::WebSearch => "web_search",
        }
    }

    /// 严格匹配（忽略大小写与首尾空白）
    pub fn from_label(raw: &str) -> Option<Source> {
        match raw.trim().to_lowercase().as_str() {
            "vector_database" => Some(Source::VectorDatabase),
            "tools_api" => Some(Source::ToolsApi),
            "web_search" => Some(Source::WebSearch),
            _ => None,
        }
    }

    /// 解析 LLM 输出；不在集合内的值一律归为 vector_database
    pub fn parse(raw: &str) -> Source {
        Self::from_label(raw).unwrap_or_else(|| {
            tracing::warn!("Invalid source '{}', defaulting to vector_database", raw.trim());
            Source::VectorDatabase
        })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次运行的完整状态，同时也是检查点的快照内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub original_query: String,
    pub rewritten_query: String,
    pub needs_retrieval: bool,
    pub selected_source: Option<Source>,
    pub retrieved_context: String,
    pub answer: String,
    pub answer_is_relevant: bool,
    pub iteration: u32,
    pub max_iterations: u32,
    pub error: Option<String>,
    pub messages: MessageLog,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>, max_iterations: u32) -> Self {
        Self::resume(query, max_iterations, MessageLog::new())
    }

    /// 续接已有线程：只继承 messages，其余字段按新查询重置
    pub fn resume(query: impl Into<String>, max_iterations: u32, messages: MessageLog) -> Self {
        Self {
            original_query: query.into(),
            rewritten_query: String::new(),
            needs_retrieval: false,
            selected_source: None,
            retrieved_context: String::new(),
            answer: String::new(),
            answer_is_relevant: false,
            iteration: 0,
            max_iterations,
            error: None,
            messages,
        }
    }

    /// 供检索与生成使用的查询：改写结果为空时回退到原查询
    pub fn effective_query(&self) -> &str {
        if self.rewritten_query.is_empty() {
            &self.original_query
        } else {
            &self.rewritten_query
        }
    }

    pub fn apply(&mut self, update: StateUpdate) {
        if update.clear_retrieval {
            self.selected_source = None;
            self.retrieved_context.clear();
        }
        if let Some(v) = update.rewritten_query {
            self.rewritten_query = v;
        }
        if let Some(v) = update.needs_retrieval {
            self.needs_retrieval = v;
        }
        if let Some(v) = update.selected_source {
            self.selected_source = Some(v);
        }
        if let Some(v) = update.retrieved_context {
            self.retrieved_context = v;
        }
        if let Some(v) = update.answer {
            self.answer = v;
        }
        if let Some(v) = update.answer_is_relevant {
            self.answer_is_relevant = v;
        }
        if let Some(v) = update.iteration {
            self.iteration = v;
        }
        self.messages.extend(update.messages);
    }

    /// 中止运行：记录错误，answer 置为 "Error: <msg>"；iteration 不变
    pub fn fail(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        self.answer = format!("Error: {}", msg);
        self.error = Some(msg);
    }
}

/// 节点产出的部分更新
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub rewritten_query: Option<String>,
    pub needs_retrieval: Option<bool>,
    pub selected_source: Option<Source>,
    pub retrieved_context: Option<String>,
    pub answer: Option<String>,
    pub answer_is_relevant: Option<bool>,
    pub iteration: Option<u32>,
    /// 清空上一轮的 selected_source 与 retrieved_context
    pub clear_retrieval: bool,
    pub messages: Vec<Message>,
}

impl StateUpdate {
    /// 追加一条 system 轨迹消息
    pub fn trace(mut self, text: impl Into<String>) -> Self {
        self.messages.push(Message::system(text));
        self
    }
}
