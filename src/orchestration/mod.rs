//! Orchestration layer: teams, phase registry and progress events.
//!
//! A phase pairs a [`Team`] with an optional workflow graph. The
//! [`Orchestrator`] owns the registry, runs phases in one or both
//! execution modes and keeps the execution history.

mod events;
mod orchestrator;
mod team;

pub use events::PhaseEvent;
pub use orchestrator::{
    ExecuteOptions, ExecutionLog, ExecutionMode, ExecutionRecord, InsightsReport, InsightsSummary,
    Orchestrator, OrchestratorCapabilities, PerformanceMetrics, PhaseExecutionReport, PhaseStatus,
    ProgressSummary, COLLABORATIVE_OUTPUT, WORKFLOW_OUTPUT,
};
pub use team::{Team, TeamPerformance};
