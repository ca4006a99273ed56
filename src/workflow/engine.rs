//! 工作流引擎
//!
//! 一次运行：载入线程最新检查点（只继承 messages）→ 追加用户消息 → 按转移图逐个执行节点直到 Terminal
//! → 写入一个检查点。致命错误与取消都不写检查点，返回带 error 的部分状态。
//! run 总是返回结构完整的 WorkflowState。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::RagError;
use crate::memory::{summarize, Message, MessageLog};
use crate::session::{CheckpointMetadata, CheckpointStore};
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::nodes::{run_node, Collaborators, NodeContext, RunSettings};
use crate::workflow::state::WorkflowState;
use crate::workflow::types::NodeId;

pub struct WorkflowEngine {
    graph: WorkflowGraph,
    collaborators: Collaborators,
    store: Arc<dyn CheckpointStore>,
    settings: RunSettings,
}

impl WorkflowEngine {
    pub(crate) fn new(
        graph: WorkflowGraph,
        collaborators: Collaborators,
        store: Arc<dyn CheckpointStore>,
        settings: RunSettings,
    ) -> Self {
        Self {
            graph,
            collaborators,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// 在线程 thread_id 上回答 query
    pub async fn run(
        &self,
        thread_id: &str,
        query: &str,
        user_id: Option<&str>,
        cancel: CancellationToken,
    ) -> WorkflowState {
        let span = tracing::info_span!("workflow_run", thread_id = %thread_id);
        self.run_inner(thread_id, query, user_id, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        thread_id: &str,
        query: &str,
        user_id: Option<&str>,
        cancel: CancellationToken,
    ) -> WorkflowState {
        let max_iterations = self.settings.max_iterations;

        let history = match self.store.latest(thread_id).await {
            Ok(Some(cp)) => cp.state.messages,
            Ok(None) => MessageLog::new(),
            Err(e) => {
                let err = RagError::Storage(e);
                tracing::error!(error = %err, "failed to load thread state");
                let mut state = WorkflowState::new(query, max_iterations);
                state.fail(err.to_string());
                return state;
            }
        };
        tracing::info!(history = %summarize(history.messages()), "run started");

        let mut state = WorkflowState::resume(query, max_iterations, history);
        state.messages.push(Message::user(query));

        let ctx = NodeContext {
            collaborators: &self.collaborators,
            settings: &self.settings,
            cancel: &cancel,
        };

        let mut node = self.graph.entry();
        while node != NodeId::Terminal {
            if cancel.is_cancelled() {
                return abort(state, node, RagError::Cancelled);
            }
            match run_node(node, &state, &ctx).await {
                Ok(update) => state.apply(update),
                Err(e) => return abort(state, node, e),
            }
            node = match self.graph.next(node, &state) {
                Ok(next) => next,
                Err(e) => return abort(state, node, RagError::Workflow(e)),
            };
        }

        let metadata = CheckpointMetadata {
            user_id: user_id.map(str::to_string),
        };
        match self.store.put(thread_id, &state, metadata).await {
            Ok(cp) => tracing::info!(
                step = cp.step,
                iteration = state.iteration,
                relevant = state.answer_is_relevant,
                messages = state.messages.len(),
                "run finished"
            ),
            Err(e) => {
                let err = RagError::Storage(e);
                tracing::error!(error = %err, "failed to persist checkpoint");
                state.error = Some(format!("Failed to persist checkpoint: {}", err));
            }
        }
        state
    }
}

fn abort(mut state: WorkflowState, node: NodeId, err: RagError) -> WorkflowState {
    match &err {
        RagError::Cancelled => tracing::warn!(node = %node, "run cancelled"),
        e => tracing::error!(node = %node, error = %e, "run aborted"),
    }
    state.fail(err.to_string());
    state
}
