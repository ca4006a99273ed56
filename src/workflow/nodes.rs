//! 工作流节点
//!
//! 每个节点读取当前状态、调用至多一个协作方，返回 StateUpdate。
//! 可降级的失败（改写、分类、选源、检索）在节点内吸收；Generate / Evaluate 的失败返回 Err，由引擎中止运行。
//! 所有协作方调用都受单次超时与取消令牌约束，超时按失败处理。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::RagError;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{dialogue_window, Message};
use crate::retrieval::{format_documents, VectorRetriever, WebSearch};
use crate::tools::ToolExecutor;
use crate::workflow::prompts;
use crate::workflow::state::{Source, StateUpdate, WorkflowState};
use crate::workflow::types::NodeId;

/// 启动时构建一次、注入引擎的外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub vector: Arc<dyn VectorRetriever>,
    pub web: Arc<dyn WebSearch>,
    pub tools: Arc<ToolExecutor>,
}

/// 单次运行的参数
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_iterations: u32,
    pub max_context_messages: usize,
    pub call_timeout: Duration,
    pub top_k: usize,
    pub web_max_results: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_context_messages: 10,
            call_timeout: Duration::from_secs(60),
            top_k: 5,
            web_max_results: 5,
        }
    }
}

/// 协作方调用未正常返回的原因
#[derive(Debug)]
enum CallError {
    Timeout(Duration),
    Cancelled,
}

/// LLM 调用失败：取消，或超时 / 接口错误（统一为 LlmError）
#[derive(Debug)]
enum LlmCallError {
    Cancelled,
    Failed(LlmError),
}

impl From<LlmCallError> for RagError {
    fn from(e: LlmCallError) -> Self {
        match e {
            LlmCallError::Cancelled => RagError::Cancelled,
            LlmCallError::Failed(e) => RagError::Llm(e),
        }
    }
}

pub struct NodeContext<'a> {
    pub collaborators: &'a Collaborators,
    pub settings: &'a RunSettings,
    pub cancel: &'a CancellationToken,
}

impl NodeContext<'_> {
    async fn call<T>(&self, fut: impl Future<Output = T>) -> Result<T, CallError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            r = tokio::time::timeout(self.settings.call_timeout, fut) => {
                r.map_err(|_| CallError::Timeout(self.settings.call_timeout))
            }
        }
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String, LlmCallError> {
        match self.call(self.collaborators.llm.complete(&messages)).await {
            Ok(r) => r.map_err(LlmCallError::Failed),
            Err(CallError::Timeout(d)) => Err(LlmCallError::Failed(LlmError::Timeout(d.as_secs()))),
            Err(CallError::Cancelled) => Err(LlmCallError::Cancelled),
        }
    }
}

/// 执行单个节点；Err 表示本次运行应中止
pub async fn run_node(
    node: NodeId,
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
) -> Result<StateUpdate, RagError> {
    match node {
        NodeId::QueryRewrite => query_rewrite(state, ctx).await,
        NodeId::NeedsInfoCheck => needs_info_check(state, ctx).await,
        NodeId::SourceSelect => source_select(state, ctx).await,
        NodeId::Retrieve => retrieve(state, ctx).await,
        NodeId::AnswerGenerate => answer_generate(state, ctx).await,
        NodeId::AnswerEvaluate => answer_evaluate(state, ctx).await,
        NodeId::Terminal => Ok(StateUpdate::default()),
    }
}

async fn query_rewrite(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate, RagError> {
    let fallback = state.effective_query().to_string();
    let rewritten = match ctx.complete(prompts::rewrite(&state.original_query)).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!(node = "query_rewrite", "empty rewrite, keeping previous query");
            fallback
        }
        Err(LlmCallError::Failed(e)) => {
            tracing::warn!(node = "query_rewrite", error = %e, "rewrite failed, keeping previous query");
            fallback
        }
        Err(LlmCallError::Cancelled) => return Err(RagError::Cancelled),
    };
    tracing::info!(node = "query_rewrite", rewritten = %rewritten);

    Ok(StateUpdate {
        rewritten_query: Some(rewritten.clone()),
        ..Default::default()
    }
    .trace(format!("Rewritten query: {}", rewritten)))
}

async fn needs_info_check(
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
) -> Result<StateUpdate, RagError> {
    let needs = match ctx.complete(prompts::needs_info(state.effective_query())).await {
        Ok(text) => match text.trim().to_uppercase().as_str() {
            "NO" => false,
            "YES" => true,
            other => {
                tracing::warn!(node = "needs_info_check", answer = %other, "unclear decision, retrieving");
                true
            }
        },
        Err(LlmCallError::Failed(e)) => {
            tracing::warn!(node = "needs_info_check", error = %e, "classifier failed, retrieving");
            true
        }
        Err(LlmCallError::Cancelled) => return Err(RagError::Cancelled),
    };
    tracing::info!(node = "needs_info_check", needs_retrieval = needs);

    Ok(StateUpdate {
        needs_retrieval: Some(needs),
        clear_retrieval: true,
        ..Default::default()
    }
    .trace(format!("Needs retrieval: {}", needs)))
}

async fn source_select(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate, RagError> {
    let source = match ctx.complete(prompts::source_select(state.effective_query())).await {
        Ok(text) => Source::parse(&text),
        Err(LlmCallError::Failed(e)) => {
            tracing::warn!(node = "source_select", error = %e, "selector failed, using vector_database");
            Source::VectorDatabase
        }
        Err(LlmCallError::Cancelled) => return Err(RagError::Cancelled),
    };
    tracing::info!(node = "source_select", source = %source);

    Ok(StateUpdate {
        selected_source: Some(source),
        ..Default::default()
    }
    .trace(format!("Selected source: {}", source)))
}

async fn retrieve(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate, RagError> {
    let source = state.selected_source.unwrap_or(Source::VectorDatabase);
    let query = state.effective_query();
    let c = ctx.collaborators;

    let outcome = match source {
        Source::VectorDatabase => ctx
            .call(c.vector.search(query, ctx.settings.top_k))
            .await
            .map(|r| r.map(|docs| format_documents(&docs))),
        Source::WebSearch => ctx
            .call(c.web.search(query, ctx.settings.web_max_results))
            .await,
        Source::ToolsApi => ctx.call(c.tools.gather_context(query)).await.map(Ok),
    };

    let context = match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(msg)) => retrieval_error(source, msg),
        Err(CallError::Timeout(d)) => {
            retrieval_error(source, format!("timed out after {}s", d.as_secs()))
        }
        Err(CallError::Cancelled) => return Err(RagError::Cancelled),
    };
    tracing::info!(node = "retrieve", source = %source, context_len = context.len());

    Ok(StateUpdate {
        retrieved_context: Some(context),
        ..Default::default()
    }
    .trace(format!("Retrieved context from {}", source)))
}

/// 检索失败不中止运行，错误文本作为上下文交给生成阶段
fn retrieval_error(source: Source, msg: String) -> String {
    let context = format!("Error during retrieval: {}", msg);
    tracing::error!(node = "retrieve", source = %source, error = %RagError::Retrieval(msg));
    context
}

async fn answer_generate(
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
) -> Result<StateUpdate, RagError> {
    let history = dialogue_window(state.messages.messages(), ctx.settings.max_context_messages);
    let messages = prompts::generate(state.effective_query(), &state.retrieved_context, &history);
    let answer = ctx.complete(messages).await?;
    let answer = answer.trim().to_string();
    tracing::info!(node = "answer_generate", answer_len = answer.len());

    let mut update = StateUpdate {
        answer: Some(answer.clone()),
        ..Default::default()
    };
    update.messages.push(Message::assistant(answer));
    Ok(update)
}

async fn answer_evaluate(
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
) -> Result<StateUpdate, RagError> {
    let history = dialogue_window(state.messages.messages(), ctx.settings.max_context_messages);
    let messages = prompts::evaluate(
        state.effective_query(),
        &state.retrieved_context,
        &state.answer,
        &history,
    );
    let verdict = ctx.complete(messages).await?;
    let relevant = verdict.trim().to_uppercase() == "YES";
    let iteration = state.iteration + 1;
    tracing::info!(node = "answer_evaluate", relevant, iteration);

    Ok(StateUpdate {
        answer_is_relevant: Some(relevant),
        iteration: Some(iteration),
        ..Default::default()
    }
    .trace(format!(
        "Answer is relevant: {} (Iteration: {})",
        relevant, iteration
    )))
}
