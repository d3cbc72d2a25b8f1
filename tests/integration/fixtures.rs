//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted capability providers with per-step failures and delays
//! - Building agents and teams
//! - A small workflow graph with a retry loop

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use archon::agent::Agent;
use archon::core::{AgentRole, Capability, CapabilitySet, Task};
use archon::orchestration::Team;
use archon::provider::{CapabilityProvider, TaskOutput};
use archon::workflow::WorkflowGraph;
use archon::{Error, Result};

/// Provider that succeeds unless the task name is in its failure list.
///
/// Every call is recorded so tests can count how often a step ran.
#[derive(Default)]
pub struct ScriptedProvider {
    fail_steps: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(steps: &[&str]) -> Self {
        Self {
            fail_steps: steps.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, step: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == step).count()
    }
}

#[async_trait]
impl CapabilityProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, task: &Task) -> Result<TaskOutput> {
        self.calls.lock().unwrap().push(task.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_steps.contains(&task.name) {
            return Err(Error::TaskExecution(format!(
                "scripted failure in {}",
                task.name
            )));
        }
        Ok(TaskOutput::new(json!({ "step": task.name }))
            .with_artifact(&format!("{}_artifact", task.name), json!(true))
            .with_recommendation(&format!("Act on {}", task.name)))
    }
}

pub fn caps(list: &[Capability]) -> CapabilitySet {
    list.iter().copied().collect()
}

pub fn agent(name: &str, capabilities: &[Capability], provider: Arc<ScriptedProvider>) -> Arc<Agent> {
    Arc::new(Agent::new(
        name,
        AgentRole::BusinessArchitect,
        caps(capabilities),
        provider,
    ))
}

pub fn team_of(agents: &[Arc<Agent>]) -> Team {
    let mut team = Team::new("test_team", "Test Team");
    for agent in agents {
        team.add_agent(Arc::clone(agent));
    }
    team
}

/// Capabilities covering every dispatch step of [`review_graph`].
pub const ALL_STEP_CAPS: [Capability; 3] = [
    Capability::AnalyzeRequirements,
    Capability::AnalyzeGaps,
    Capability::ValidateQuality,
];

/// `collect -> analyze -> review -> publish`, where a failed review
/// retries from `analyze` and requires outputs of both earlier steps.
pub fn review_graph(phase: &str) -> WorkflowGraph {
    WorkflowGraph::builder(phase)
        .dispatch("collect", caps(&[Capability::AnalyzeRequirements]))
        .dispatch("analyze", caps(&[Capability::AnalyzeGaps]))
        .dispatch("review", caps(&[Capability::ValidateQuality]))
        .record("publish")
        .entry("collect")
        .edge("collect", "analyze")
        .edge("analyze", "review")
        .validate("review", &["collect", "analyze"], "publish", "analyze")
        .end("publish")
        .build()
        .expect("review graph is valid")
}
