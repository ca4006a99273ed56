//! 工作流类型定义
//!
//! 节点、路由谓词与边都是封闭枚举，转移表在 WorkflowGraph::new 时整体校验。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::state::WorkflowState;

/// 工作流节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    QueryRewrite,
    NeedsInfoCheck,
    SourceSelect,
    Retrieve,
    AnswerGenerate,
    AnswerEvaluate,
    Terminal,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::QueryRewrite => "query_rewrite",
            NodeId::NeedsInfoCheck => "needs_info_check",
            NodeId::SourceSelect => "source_select",
            NodeId::Retrieve => "retrieve",
            NodeId::AnswerGenerate => "answer_generate",
            NodeId::AnswerEvaluate => "answer_evaluate",
            NodeId::Terminal => "terminal",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件边的谓词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// needs_retrieval
    NeedsRetrieval,
    /// answer_is_relevant 或 iteration 已达 max_iterations
    AnswerAccepted,
}

impl Route {
    pub fn holds(&self, state: &WorkflowState) -> bool {
        match self {
            Route::NeedsRetrieval => state.needs_retrieval,
            Route::AnswerAccepted => {
                state.answer_is_relevant || state.iteration >= state.max_iterations
            }
        }
    }
}

/// 节点的出边
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Always(NodeId),
    Branch {
        route: Route,
        then: NodeId,
        otherwise: NodeId,
    },
}

impl Edge {
    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            Edge::Always(to) => vec![*to],
            Edge::Branch { then, otherwise, .. } => vec![*then, *otherwise],
        }
    }

    pub fn resolve(&self, state: &WorkflowState) -> NodeId {
        match self {
            Edge::Always(to) => *to,
            Edge::Branch { route, then, otherwise } => {
                if route.holds(state) {
                    *then
                } else {
                    *otherwise
                }
            }
        }
    }
}

/// 工作流错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Node {0} has no outgoing edge")]
    MissingEdge(NodeId),
    #[error("Node {0} has more than one outgoing edge")]
    DuplicateEdge(NodeId),
    #[error("Terminal node must not have outgoing edges")]
    EdgeFromTerminal,
    #[error("Terminal is unreachable from {0}")]
    TerminalUnreachable(NodeId),
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfiguration(String),
}
