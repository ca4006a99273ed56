//! 工作流转移图
//!
//! 邻接表：节点 → 唯一出边。构造时校验：每个可达的非终止节点恰有一条出边、Terminal 无出边、
//! Terminal 从入口可达。运行期只需查表，不会遇到缺边。

use std::collections::{HashMap, HashSet, VecDeque};

use crate::workflow::state::WorkflowState;
use crate::workflow::types::*;

#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: NodeId,
    edges: HashMap<NodeId, Edge>,
}

impl WorkflowGraph {
    pub fn new(entry: NodeId, edges: Vec<(NodeId, Edge)>) -> Result<Self, WorkflowError> {
        let mut table: HashMap<NodeId, Edge> = HashMap::new();
        for (from, edge) in edges {
            if from == NodeId::Terminal {
                return Err(WorkflowError::EdgeFromTerminal);
            }
            if table.insert(from, edge).is_some() {
                return Err(WorkflowError::DuplicateEdge(from));
            }
        }

        // BFS：沿途每个非终止节点都必须有出边
        let mut seen = HashSet::from([entry]);
        let mut queue = VecDeque::from([entry]);
        while let Some(node) = queue.pop_front() {
            if node == NodeId::Terminal {
                continue;
            }
            let edge = table.get(&node).ok_or(WorkflowError::MissingEdge(node))?;
            for to in edge.targets() {
                if seen.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        if !seen.contains(&NodeId::Terminal) {
            return Err(WorkflowError::TerminalUnreachable(entry));
        }

        Ok(Self { entry, edges: table })
    }

    /// 标准 agentic RAG 转移表
    pub fn agentic_rag() -> Result<Self, WorkflowError> {
        use NodeId::*;
        Self::new(
            QueryRewrite,
            vec![
                (QueryRewrite, Edge::Always(NeedsInfoCheck)),
                (
                    NeedsInfoCheck,
                    Edge::Branch {
                        route: Route::NeedsRetrieval,
                        then: SourceSelect,
                        otherwise: AnswerGenerate,
                    },
                ),
                (SourceSelect, Edge::Always(Retrieve)),
                (Retrieve, Edge::Always(AnswerGenerate)),
                (AnswerGenerate, Edge::Always(AnswerEvaluate)),
                (
                    AnswerEvaluate,
                    Edge::Branch {
                        route: Route::AnswerAccepted,
                        then: Terminal,
                        otherwise: QueryRewrite,
                    },
                ),
            ],
        )
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// 下一个节点；Terminal 没有后继
    pub fn next(&self, from: NodeId, state: &WorkflowState) -> Result<NodeId, WorkflowError> {
        self.edges
            .get(&from)
            .map(|edge| edge.resolve(state))
            .ok_or(WorkflowError::MissingEdge(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_routes() {
        let g = WorkflowGraph::agentic_rag().unwrap();
        let mut s = WorkflowState::new("q", 3);
        assert_eq!(g.entry(), NodeId::QueryRewrite);
        assert_eq!(g.next(NodeId::QueryRewrite, &s).unwrap(), NodeId::NeedsInfoCheck);

        s.needs_retrieval = true;
        assert_eq!(g.next(NodeId::NeedsInfoCheck, &s).unwrap(), NodeId::SourceSelect);
        s.needs_retrieval = false;
        assert_eq!(g.next(NodeId::NeedsInfoCheck, &s).unwrap(), NodeId::AnswerGenerate);

        s.iteration = 1;
        assert_eq!(g.next(NodeId::AnswerEvaluate, &s).unwrap(), NodeId::QueryRewrite);
        s.iteration = 3;
        assert_eq!(g.next(NodeId::AnswerEvaluate, &s).unwrap(), NodeId::Terminal);
        s.iteration = 1;
        s.answer_is_relevant = true;
        assert_eq!(g.next(NodeId::AnswerEvaluate, &s).unwrap(), NodeId::Terminal);

        assert_eq!(
            g.next(NodeId::Terminal, &s),
            Err(WorkflowError::MissingEdge(NodeId::Terminal))
        );
    }

    #[test]
    fn test_rejects_missing_edge() {
        let err = WorkflowGraph::new(
            NodeId::QueryRewrite,
            vec![(NodeId::QueryRewrite, Edge::Always(NodeId::NeedsInfoCheck))],
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::MissingEdge(NodeId::NeedsInfoCheck));
    }

    #[test]
    fn test_rejects_duplicate_and_terminal_edges() {
        let err = WorkflowGraph::new(
            NodeId::QueryRewrite,
            vec![
                (NodeId::QueryRewrite, Edge::Always(NodeId::Terminal)),
                (NodeId::QueryRewrite, Edge::Always(NodeId::Terminal)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::DuplicateEdge(NodeId::QueryRewrite));

        let err = WorkflowGraph::new(
            NodeId::QueryRewrite,
            vec![
                (NodeId::QueryRewrite, Edge::Always(NodeId::Terminal)),
                (NodeId::Terminal, Edge::Always(NodeId::QueryRewrite)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::EdgeFromTerminal);
    }

    #[test]
    fn test_rejects_unreachable_terminal() {
        let err = WorkflowGraph::new(
            NodeId::QueryRewrite,
            vec![
                (NodeId::QueryRewrite, Edge::Always(NodeId::NeedsInfoCheck)),
                (NodeId::NeedsInfoCheck, Edge::Always(NodeId::QueryRewrite)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::TerminalUnreachable(NodeId::QueryRewrite));
    }
}
