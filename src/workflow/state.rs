//! Mutable record carried through one workflow walk.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::task::Task;
use crate::provider::TaskOutput;

/// Step marker written once the walk reaches a terminal edge.
pub const COMPLETED_STEP: &str = "completed";

/// How the validation step resolved, if it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ValidationOutcome {
    NotReached,
    Passed { iterations: u32 },
    ForcedAfterCap { iterations: u32 },
    /// Validation ran but the walk stopped before it resolved.
    Unresolved { iterations: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase_name: String,
    pub current_step: String,
    /// Steps whose handler succeeded, in execution order. Retried steps
    /// appear once per successful run.
    pub completed_steps: Vec<String>,
    pub artifacts: Map<String, Value>,
    pub recommendations: Vec<String>,
    pub errors: Vec<String>,
    pub validation_passed: bool,
    pub agent_outputs: BTreeMap<String, Value>,
    /// Visits to the validation step so far.
    pub iteration: u32,
    pub forced_termination: bool,
    pub cancelled: bool,
    pub steps_executed: u32,
}

impl WorkflowState {
    pub fn new(phase_name: &str, artifacts: Map<String, Value>) -> Self {
        Self {
            phase_name: phase_name.to_string(),
            current_step: String::new(),
            completed_steps: Vec::new(),
            artifacts,
            recommendations: Vec::new(),
            errors: Vec::new(),
            validation_passed: false,
            agent_outputs: BTreeMap::new(),
            iteration: 0,
            forced_termination: false,
            cancelled: false,
            steps_executed: 0,
        }
    }

    /// Fold a successful dispatch into the state.
    pub fn record_output(&mut self, step: &str, task: &Task, output: TaskOutput) {
        self.agent_outputs.insert(step.to_string(), output.data);
        self.artifacts.extend(output.artifacts);
        self.recommendations.extend(task.recommendations.iter().cloned());
        self.completed_steps.push(step.to_string());
    }

    pub fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn is_finished(&self) -> bool {
        self.current_step == COMPLETED_STEP
    }

    pub fn validation_outcome(&self) -> ValidationOutcome {
        let iterations = self.iteration;
        if iterations == 0 {
            ValidationOutcome::NotReached
        } else if self.validation_passed {
            ValidationOutcome::Passed { iterations }
        } else if self.forced_termination {
            ValidationOutcome::ForcedAfterCap { iterations }
        } else {
            ValidationOutcome::Unresolved { iterations }
        }
    }
}
