//! 各节点的 Prompt 模板
//!
//! 每类 Prompt 以固定的 system 消息开头，PromptKind::detect 据此反查类型（Mock LLM 按类型编排回复）。

use crate::memory::Message;

const REWRITE_SYSTEM: &str = "You are an expert at rewriting user queries to be more effective for information retrieval.
Your tasks:
1. Fix any spelling or grammatical errors
2. Simplify complex queries while preserving intent
3. Make queries more specific and searchable
4. Remove ambiguity
Return ONLY the rewritten query without any explanation.";

const NEEDS_INFO_SYSTEM: &str = "You are an expert at determining if a query requires external information to answer.
Decide whether the query needs information from documents, databases, tools or the internet, or whether general knowledge is enough.
Respond with ONLY 'YES' if external information is needed, or 'NO' if it can be answered directly.";

const SOURCE_SELECT_SYSTEM: &str = "You are an expert at selecting the best information source for a query.
Available sources:
1. vector_database - indexed documents and knowledge base
2. tools_api - calculators, date/time and other structured tools
3. web_search - real-time information from the internet
Respond with ONLY one of: vector_database, tools_api, or web_search";

const GENERATE_WITH_CONTEXT_SYSTEM: &str = "You are a helpful assistant that answers questions accurately and concisely.
Use the provided context to answer the user's question. If the context doesn't contain enough information to answer fully, say so clearly.";

const GENERATE_DIRECT_SYSTEM: &str = "You are a helpful assistant that answers questions accurately and concisely based on your general knowledge.
Answer the user's question directly without requiring external context.";

const EVALUATE_SYSTEM: &str = "You are an expert evaluator assessing answer quality and relevance.
Evaluate if the answer properly addresses the query and is consistent with the provided context (if any).
Respond with ONLY 'YES' if the answer is relevant and satisfactory, or 'NO' if it needs improvement.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Rewrite,
    NeedsInfo,
    SourceSelect,
    GenerateWithContext,
    GenerateDirect,
    Evaluate,
}

impl PromptKind {
    pub const ALL: [PromptKind; 6] = [
        PromptKind::Rewrite,
        PromptKind::NeedsInfo,
        PromptKind::SourceSelect,
        PromptKind::GenerateWithContext,
        PromptKind::GenerateDirect,
        PromptKind::Evaluate,
    ];

    pub fn system_prompt(&self) -> &'static str {
        match self {
            PromptKind::Rewrite => REWRITE_SYSTEM,
            PromptKind::NeedsInfo => NEEDS_INFO_SYSTEM,
            PromptKind::SourceSelect => SOURCE_SELECT_SYSTEM,
            PromptKind::GenerateWithContext => GENERATE_WITH_CONTEXT_SYSTEM,
            PromptKind::GenerateDirect => GENERATE_DIRECT_SYSTEM,
            PromptKind::Evaluate => EVALUATE_SYSTEM,
        }
    }

    /// 按首条消息的内容识别 Prompt 类型
    pub fn detect(messages: &[Message]) -> Option<PromptKind> {
        let first = messages.first()?;
        Self::ALL
            .into_iter()
            .find(|k| k.system_prompt() == first.content)
    }
}

pub fn rewrite(query: &str) -> Vec<Message> {
    vec![
        Message::system(REWRITE_SYSTEM),
        Message::user(format!("Original query: {}", query)),
    ]
}

pub fn needs_info(query: &str) -> Vec<Message> {
    vec![
        Message::system(NEEDS_INFO_SYSTEM),
        Message::user(format!("Query: {}", query)),
    ]
}

pub fn source_select(query: &str) -> Vec<Message> {
    vec![
        Message::system(SOURCE_SELECT_SYSTEM),
        Message::user(format!("Query: {}", query)),
    ]
}

/// 有上下文时用带 Context 的模板，否则用直接作答模板；history 为已截断的窗口
pub fn generate(query: &str, context: &str, history: &[Message]) -> Vec<Message> {
    let (system, question) = if context.is_empty() {
        (GENERATE_DIRECT_SYSTEM, format!("Question: {}", query))
    } else {
        (
            GENERATE_WITH_CONTEXT_SYSTEM,
            format!("Question: {}\n\nContext:\n{}\n\nAnswer:", query, context),
        )
    };
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(question));
    messages
}

pub fn evaluate(query: &str, context: &str, answer: &str, history: &[Message]) -> Vec<Message> {
    let context = if context.is_empty() { "None" } else { context };
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(EVALUATE_SYSTEM));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(format!(
        "Query: {}\nContext: {}\nAnswer: {}\n\nIs this answer relevant and satisfactory?",
        query, context, answer
    )));
    messages
}
