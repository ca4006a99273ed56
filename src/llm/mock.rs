//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按 PromptKind 识别请求类型：有编排队列时依次弹出回复，队列空后使用该类型的默认回复。
//! 未编排时的默认行为可跑通整条工作流（改写回显原查询、不检索、答案判为相关）。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};
use crate::workflow::prompts::PromptKind;

/// 单次编排回复
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
    /// 永不返回（测试超时与取消）
    Hang,
}

impl From<&str> for MockReply {
    fn from(s: &str) -> Self {
        MockReply::Text(s.to_string())
    }
}

#[derive(Default)]
pub struct MockLlmClient {
    queues: Mutex<HashMap<PromptKind, VecDeque<MockReply>>>,
    defaults: HashMap<PromptKind, MockReply>,
    calls: Mutex<HashMap<PromptKind, usize>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条一次性回复
    pub fn reply(mut self, kind: PromptKind, reply: impl Into<MockReply>) -> Self {
        self.queues
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push_back(reply.into());
        self
    }

    /// 设置该类型在队列耗尽后的固定回复
    pub fn always(mut self, kind: PromptKind, reply: impl Into<MockReply>) -> Self {
        self.defaults.insert(kind, reply.into());
        self
    }

    /// 该类型被调用的次数
    pub fn calls(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    fn next_reply(&self, kind: PromptKind) -> Option<MockReply> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_insert(0) += 1;
        let queued = self
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&kind)
            .and_then(|q| q.pop_front());
        queued.or_else(|| self.defaults.get(&kind).cloned())
    }
}

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

fn builtin_reply(kind: Option<PromptKind>, messages: &[Message]) -> String {
    let input = last_user(messages);
    match kind {
        Some(PromptKind::Rewrite) => input
            .strip_prefix("Original query: ")
            .unwrap_or(input)
            .to_string(),
        Some(PromptKind::NeedsInfo) => "NO".to_string(),
        Some(PromptKind::SourceSelect) => "vector_database".to_string(),
        Some(PromptKind::GenerateWithContext) | Some(PromptKind::GenerateDirect) => {
            let question = input.lines().next().unwrap_or(input);
            let question = question.strip_prefix("Question: ").unwrap_or(question);
            format!("Mock answer for: {}", question)
        }
        Some(PromptKind::Evaluate) => "YES".to_string(),
        None => input.to_string(),
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let kind = PromptKind::detect(messages);
        let scripted = kind.and_then(|k| self.next_reply(k));
        match scripted {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(e)) => Err(LlmError::Api(e)),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(builtin_reply(kind, messages)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
