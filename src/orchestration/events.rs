//! Progress events emitted while a phase runs.

use std::time::Duration;

use super::orchestrator::PhaseStatus;

/// Events emitted by the orchestrator and workflow engine.
///
/// Sent on an optional `tokio::sync::mpsc` channel; a dropped receiver is
/// ignored and never affects execution.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    PhaseStarted {
        phase: String,
    },
    StepStarted {
        phase: String,
        step: String,
        /// Validation visits completed before this step.
        iteration: u32,
    },
    StepCompleted {
        phase: String,
        step: String,
        agent: String,
    },
    StepFailed {
        phase: String,
        step: String,
        error: String,
    },
    ValidationEvaluated {
        phase: String,
        iteration: u32,
        passed: bool,
        forced: bool,
    },
    PhaseCompleted {
        phase: String,
        status: PhaseStatus,
        duration: Duration,
    },
}

impl PhaseEvent {
    pub fn phase(&self) -> &str {
        match self {
            PhaseEvent::PhaseStarted { phase }
            | PhaseEvent::StepStarted { phase, .. }
            | PhaseEvent::StepCompleted { phase, .. }
            | PhaseEvent::StepFailed { phase, .. }
            | PhaseEvent::ValidationEvaluated { phase, .. }
            | PhaseEvent::PhaseCompleted { phase, .. } => phase,
        }
    }
}
