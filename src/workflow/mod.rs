//! Agentic RAG 工作流：状态、转移图、节点与执行引擎

pub mod builder;
pub mod engine;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod state;
pub mod types;

pub use builder::WorkflowBuilder;
pub use engine::WorkflowEngine;
pub use graph::WorkflowGraph;
pub use nodes::{Collaborators, RunSettings};
pub use state::{Source, StateUpdate, WorkflowState};
pub use types::*;
