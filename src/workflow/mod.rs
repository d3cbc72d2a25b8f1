//! Per-phase workflow state machines.
//!
//! A [`WorkflowGraph`] names the steps and edges of one phase, a
//! [`WorkflowEngine`] walks it against a team, and the walk produces a
//! [`WorkflowState`].

mod engine;
mod graph;
mod state;

pub use engine::WorkflowEngine;
pub use graph::{
    GateDecision, Step, StepAction, Transition, ValidationGate, WorkflowGraph,
    WorkflowGraphBuilder,
};
pub use state::{ValidationOutcome, WorkflowState, COMPLETED_STEP};
