pub mod adm;
pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod provider;
pub mod workflow;

pub use agent::{Agent, AgentId, AgentMetrics};
pub use config::Config;
pub use crate::core::{AgentRole, Capability, CapabilitySet, Priority, Task, TaskId, TaskStatus};
pub use error::{Error, Result};
pub use orchestration::{
    ExecuteOptions, ExecutionMode, Orchestrator, PhaseEvent, PhaseExecutionReport, PhaseStatus,
    Team,
};
pub use provider::{AnalyzerProvider, CapabilityProvider, FnProvider, TaskOutput};
pub use workflow::{WorkflowEngine, WorkflowGraph, WorkflowState};
