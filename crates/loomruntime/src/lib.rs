//! Workflow execution runtime
//!
//! This crate provides the engine that runs graphs: the node type registry,
//! the graph walk that routes item-sets along edges, and the runtime facade
//! that owns the execution log and event bus.

mod executor;
mod registry;
mod runtime;

pub use executor::{validate_graph, NodeRun, RunResult, RunStatus, WorkflowExecutor};
pub use registry::{NodeRegistry, RegisteredNode};
pub use runtime::{BranchMode, EngineState, FanInMode, FlowRuntime, RuntimeConfig};
