//! Drives a [`WorkflowGraph`] to a terminal step.
//!
//! Each dispatch step becomes a task routed through the phase team. A
//! failing step is recorded in the state and the walk moves on along the
//! step's edge; only cancellation or the invocation budget stop it early.

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::graph::{GateDecision, Step, StepAction, Transition, WorkflowGraph};
use super::state::{WorkflowState, COMPLETED_STEP};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::core::capability::{AgentRole, CapabilitySet};
use crate::core::task::{Priority, Task};
use crate::error::Error;
use crate::orchestration::{PhaseEvent, Team};
use crate::{alog_debug, alog_trace, alog_warn};

pub struct WorkflowEngine<'a> {
    graph: &'a WorkflowGraph,
    team: &'a Team,
    max_iterations: u32,
    events: Option<mpsc::Sender<PhaseEvent>>,
    cancel: Option<CancellationToken>,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(graph: &'a WorkflowGraph, team: &'a Team) -> Self {
        Self {
            graph,
            team,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            events: None,
            cancel: None,
        }
    }

    /// Cap on validation visits; values below 1 are treated as 1.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<PhaseEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    async fn emit(&self, event: PhaseEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Walk the graph from its entry until a terminal edge is taken.
    pub async fn run(&self, context: Map<String, Value>) -> WorkflowState {
        let phase = self.graph.phase_name();
        let mut state = WorkflowState::new(phase, self.graph.initial_artifacts(context));
        let budget = self.graph.max_step_invocations(self.max_iterations);
        let mut current = self.graph.entry().to_string();

        loop {
            if self.is_cancelled() {
                alog_warn!("Workflow {} cancelled before step {}", phase, current);
                state.cancelled = true;
                state.record_error(format!("Workflow cancelled before step {}", current));
                break;
            }
            if state.steps_executed >= budget {
                state.record_error(format!(
                    "Workflow stopped after {} step invocations",
                    state.steps_executed
                ));
                break;
            }
            let (Some(step), Some(transition)) =
                (self.graph.step(&current), self.graph.transition(&current))
            else {
                state.record_error(format!("Unknown step {}", current));
                break;
            };

            state.current_step = current.clone();
            self.emit(PhaseEvent::StepStarted {
                phase: phase.to_string(),
                step: current.clone(),
                iteration: state.iteration,
            })
            .await;
            self.run_step(step, &mut state).await;
            state.steps_executed += 1;
            alog_trace!(
                "Workflow {} after {}: completed={:?} iteration={} errors={}",
                phase,
                current,
                state.completed_steps,
                state.iteration,
                state.errors.len()
            );

            current = match transition {
                Transition::Next(next) => next.clone(),
                Transition::End => {
                    state.current_step = COMPLETED_STEP.to_string();
                    break;
                }
                Transition::Validate(gate) => {
                    state.iteration += 1;
                    let decision = gate.decide(state.iteration, &state.agent_outputs, self.max_iterations);
                    state.validation_passed = decision == GateDecision::Pass;
                    if decision == GateDecision::ForcedPass {
                        state.forced_termination = true;
                        alog_warn!(
                            "Workflow {} validation forced through after {} iterations",
                            phase,
                            state.iteration
                        );
                    }
                    self.emit(PhaseEvent::ValidationEvaluated {
                        phase: phase.to_string(),
                        iteration: state.iteration,
                        passed: state.validation_passed,
                        forced: state.forced_termination,
                    })
                    .await;
                    gate.target(decision).to_string()
                }
            };
        }
        state
    }

    async fn run_step(&self, step: &Step, state: &mut WorkflowState) {
        match &step.action {
            StepAction::Record => state.completed_steps.push(step.name.clone()),
            StepAction::Dispatch {
                capabilities,
                role,
                priority,
            } => {
                self.dispatch(step, capabilities, *role, *priority, state)
                    .await
            }
        }
    }

    async fn dispatch(
        &self,
        step: &Step,
        capabilities: &CapabilitySet,
        role: Option<AgentRole>,
        priority: Priority,
        state: &mut WorkflowState,
    ) {
        let phase = self.graph.phase_name();
        let mut task = Task::new(&step.name, capabilities.clone())
            .with_description(&format!("Execute {} for {}", step.name, phase))
            .with_priority(priority)
            .with_context(state.artifacts.clone());
        if let Some(role) = role {
            task = task.with_role(role);
        }

        match self.team.execute_task(&mut task, self.cancel.as_ref()).await {
            Ok((agent, output)) => {
                alog_debug!("Step {} completed by {}", step.name, agent.name());
                state.record_output(&step.name, &task, output);
                self.emit(PhaseEvent::StepCompleted {
                    phase: phase.to_string(),
                    step: step.name.clone(),
                    agent: agent.name().to_string(),
                })
                .await;
            }
            Err(e) => self.step_failed(step, &e, state).await,
        }
    }

    async fn step_failed(&self, step: &Step, error: &Error, state: &mut WorkflowState) {
        alog_warn!("Step {} failed: {}", step.name, error);
        state.record_error(format!("Step {} failed: {}", step.name, error));
        self.emit(PhaseEvent::StepFailed {
            phase: self.graph.phase_name().to_string(),
            step: step.name.clone(),
            error: error.to_string(),
        })
        .await;
    }
}
