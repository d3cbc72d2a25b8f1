//! Workflow graph: the per-phase state machine definition.
//!
//! A graph is a transition table over named steps. Ordinary steps have a
//! single successor, terminal steps have none, and exactly one validation
//! step chooses between a "pass" and a "retry" successor through a guard.
//! Graphs are immutable once built; [`WorkflowGraphBuilder::build`]
//! rejects any shape the engine could loop on forever.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{Map, Value};

use crate::core::capability::{AgentRole, CapabilitySet};
use crate::core::task::Priority;
use crate::error::{Error, Result};

/// What running a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Route a task requiring these capabilities through the phase team.
    Dispatch {
        capabilities: CapabilitySet,
        role: Option<AgentRole>,
        priority: Priority,
    },
    /// Local bookkeeping only: the step is recorded as completed.
    Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub action: StepAction,
}

/// The conditional edge leaving the validation step.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationGate {
    /// Steps whose outputs must all be present for validation to pass.
    pub required_outputs: Vec<String>,
    pub pass: String,
    pub retry: String,
}

/// Outcome of evaluating the validation guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Retry,
    /// Outputs still missing but the iteration cap was reached.
    ForcedPass,
}

impl ValidationGate {
    /// Guard predicate. `iteration` is the count including this visit.
    pub fn decide(
        &self,
        iteration: u32,
        agent_outputs: &BTreeMap<String, Value>,
        max_iterations: u32,
    ) -> GateDecision {
        let complete = self
            .required_outputs
            .iter()
            .all(|step| agent_outputs.contains_key(step));
        if complete {
            GateDecision::Pass
        } else if iteration >= max_iterations {
            GateDecision::ForcedPass
        } else {
            GateDecision::Retry
        }
    }

    pub fn target(&self, decision: GateDecision) -> &str {
        match decision {
            GateDecision::Pass | GateDecision::ForcedPass => &self.pass,
            GateDecision::Retry => &self.retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Next(String),
    Validate(ValidationGate),
    End,
}

#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    phase_name: String,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    entry: String,
    transitions: HashMap<String, Transition>,
    validation_step: String,
    defaults: Map<String, Value>,
}

impl WorkflowGraph {
    pub fn builder(phase_name: &str) -> WorkflowGraphBuilder {
        WorkflowGraphBuilder::new(phase_name)
    }

    pub fn phase_name(&self) -> &str {
        &self.phase_name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    pub fn transition(&self, step: &str) -> Option<&Transition> {
        self.transitions.get(step)
    }

    pub fn validation_step(&self) -> &str {
        &self.validation_step
    }

    pub fn validation_gate(&self) -> Option<&ValidationGate> {
        match self.transitions.get(&self.validation_step) {
            Some(Transition::Validate(gate)) => Some(gate),
            _ => None,
        }
    }

    /// Defaults overlaid with the supplied context; context wins.
    pub fn initial_artifacts(&self, context: Map<String, Value>) -> Map<String, Value> {
        let mut artifacts = self.defaults.clone();
        artifacts.extend(context);
        artifacts
    }

    /// Upper bound on handler invocations for one walk.
    ///
    /// Each validation visit is preceded by at most one pass over every
    /// step, and the visit count is capped at `max_iterations`; the final
    /// pass to the terminal adds at most one more sweep.
    pub fn max_step_invocations(&self, max_iterations: u32) -> u32 {
        let steps = u32::try_from(self.steps.len()).unwrap_or(u32::MAX);
        steps.saturating_mul(max_iterations.max(1).saturating_add(1))
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowGraphBuilder {
    phase_name: String,
    steps: Vec<Step>,
    entry: Option<String>,
    transitions: Vec<(String, Transition)>,
    defaults: Map<String, Value>,
}

impl WorkflowGraphBuilder {
    pub fn new(phase_name: &str) -> Self {
        Self {
            phase_name: phase_name.to_string(),
            steps: Vec::new(),
            entry: None,
            transitions: Vec::new(),
            defaults: Map::new(),
        }
    }

    /// Add a step that dispatches a task needing `capabilities`.
    pub fn dispatch(mut self, name: &str, capabilities: CapabilitySet) -> Self {
        self.steps.push(Step {
            name: name.to_string(),
            action: StepAction::Dispatch {
                capabilities,
                role: None,
                priority: Priority::High,
            },
        });
        self
    }

    /// Like [`dispatch`](Self::dispatch), with a role hint on the task.
    pub fn dispatch_as(mut self, name: &str, role: AgentRole, capabilities: CapabilitySet) -> Self {
        self.steps.push(Step {
            name: name.to_string(),
            action: StepAction::Dispatch {
                capabilities,
                role: Some(role),
                priority: Priority::High,
            },
        });
        self
    }

    /// Add a bookkeeping step that runs no agent.
    pub fn record(mut self, name: &str) -> Self {
        self.steps.push(Step {
            name: name.to_string(),
            action: StepAction::Record,
        });
        self
    }

    pub fn entry(mut self, step: &str) -> Self {
        self.entry = Some(step.to_string());
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.transitions
            .push((from.to_string(), Transition::Next(to.to_string())));
        self
    }

    pub fn validate(mut self, step: &str, required_outputs: &[&str], pass: &str, retry: &str) -> Self {
        self.transitions.push((
            step.to_string(),
            Transition::Validate(ValidationGate {
                required_outputs: required_outputs.iter().map(|s| s.to_string()).collect(),
                pass: pass.to_string(),
                retry: retry.to_string(),
            }),
        ));
        self
    }

    pub fn end(mut self, step: &str) -> Self {
        self.transitions.push((step.to_string(), Transition::End));
        self
    }

    pub fn default_artifact(mut self, key: &str, value: Value) -> Self {
        self.defaults.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Result<WorkflowGraph> {
        let invalid = |msg: String| Error::Validation(format!("workflow {}: {}", self.phase_name, msg));

        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }

        let mut index = HashMap::new();
        for (i, step) in self.steps.iter().enumerate() {
            if index.insert(step.name.clone(), i).is_some() {
                return Err(invalid(format!("duplicate step {}", step.name)));
            }
        }

        let entry = self
            .entry
            .clone()
            .ok_or_else(|| invalid("no entry step".to_string()))?;
        if !index.contains_key(&entry) {
            return Err(invalid(format!("entry step {} does not exist", entry)));
        }

        let mut transitions = HashMap::new();
        for (from, transition) in &self.transitions {
            if !index.contains_key(from) {
                return Err(invalid(format!("edge from unknown step {}", from)));
            }
            if transitions.insert(from.clone(), transition.clone()).is_some() {
                return Err(invalid(format!("step {} has more than one outgoing edge", from)));
            }
        }

        let mut validation_step = None;
        for step in &self.steps {
            match transitions.get(&step.name) {
                None => {
                    return Err(invalid(format!("step {} has no outgoing edge", step.name)));
                }
                Some(Transition::Next(to)) if !index.contains_key(to) => {
                    return Err(invalid(format!("edge {} -> {} targets unknown step", step.name, to)));
                }
                Some(Transition::Validate(gate)) => {
                    if validation_step.replace(step.name.clone()).is_some() {
                        return Err(invalid("more than one validation step".to_string()));
                    }
                    for target in [&gate.pass, &gate.retry] {
                        if !index.contains_key(target) {
                            return Err(invalid(format!(
                                "validation {} targets unknown step {}",
                                step.name, target
                            )));
                        }
                    }
                    for required in &gate.required_outputs {
                        let dispatches = index
                            .get(required)
                            .map(|&i| matches!(self.steps[i].action, StepAction::Dispatch { .. }))
                            .unwrap_or(false);
                        if !dispatches {
                            return Err(invalid(format!(
                                "required output {} is not produced by any dispatch step",
                                required
                            )));
                        }
                    }
                }
                Some(_) => {}
            }
        }
        let validation_step =
            validation_step.ok_or_else(|| invalid("no validation step".to_string()))?;

        self.check_shape(&index, &transitions, &entry, &validation_step)
            .map_err(invalid)?;

        Ok(WorkflowGraph {
            phase_name: self.phase_name,
            steps: self.steps,
            index,
            entry,
            transitions,
            validation_step,
            defaults: self.defaults,
        })
    }

    /// Structural checks: reachability, the retry loop, no other cycles.
    fn check_shape(
        &self,
        index: &HashMap<String, usize>,
        transitions: &HashMap<String, Transition>,
        entry: &str,
        validation_step: &str,
    ) -> std::result::Result<(), String> {
        let mut full: DiGraph<&str, ()> = DiGraph::new();
        let mut forward: DiGraph<&str, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = self.steps.iter().map(|s| full.add_node(&s.name)).collect();
        for step in &self.steps {
            forward.add_node(&step.name);
        }
        let node = |name: &str| nodes[index[name]];

        let mut terminals = Vec::new();
        let mut retry_target = None;
        for step in &self.steps {
            let from = node(&step.name);
            match &transitions[&step.name] {
                Transition::Next(to) => {
                    full.add_edge(from, node(to), ());
                    forward.add_edge(from, node(to), ());
                }
                Transition::Validate(gate) => {
                    full.add_edge(from, node(&gate.pass), ());
                    full.add_edge(from, node(&gate.retry), ());
                    forward.add_edge(from, node(&gate.pass), ());
                    retry_target = Some(node(&gate.retry));
                }
                Transition::End => terminals.push(from),
            }
        }

        let start = node(entry);
        for step in &self.steps {
            if !has_path_connecting(&full, start, node(&step.name), None) {
                return Err(format!("step {} is unreachable from {}", step.name, entry));
            }
        }
        if !terminals
            .iter()
            .any(|&t| has_path_connecting(&full, start, t, None))
        {
            return Err("no terminal step is reachable".to_string());
        }
        if let Some(retry) = retry_target {
            if !has_path_connecting(&full, retry, node(validation_step), None) {
                return Err(format!(
                    "retry target does not lead back to {}",
                    validation_step
                ));
            }
        }
        if is_cyclic_directed(&forward) {
            return Err("cycle outside the validation retry loop".to_string());
        }
        Ok(())
    }
}
