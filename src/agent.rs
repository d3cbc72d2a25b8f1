//! Agents: workers with declared capabilities.
//!
//! An agent holds at most one active task. Assignment is a check-and-set
//! under the agent's state lock, so two phases routing to the same agent
//! concurrently see `AgentBusy` instead of sharing it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::capability::{AgentRole, CapabilitySet};
use crate::core::memory::{AgentMemory, EpisodeOutcome};
use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::provider::{CapabilityProvider, TaskOutput};
use crate::{alog_debug, alog_warn};

/// Unique identifier for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters reported by [`Agent::get_performance_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub role: AgentRole,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    pub total_tasks: u32,
    /// completed / max(completed + failed, 1)
    pub success_rate: f64,
    pub average_execution_ms: u64,
}

#[derive(Debug, Default)]
struct AgentState {
    current_task: Option<TaskId>,
    task_history: Vec<Task>,
    tasks_completed: u32,
    tasks_failed: u32,
    total_execution: Duration,
    memory: AgentMemory,
}

pub struct Agent {
    id: AgentId,
    name: String,
    role: AgentRole,
    description: String,
    capabilities: CapabilitySet,
    provider: Arc<dyn CapabilityProvider>,
    timeout: Option<Duration>,
    state: Mutex<AgentState>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("capabilities", &self.capabilities)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Agent {
    pub fn new(
        name: &str,
        role: AgentRole,
        capabilities: CapabilitySet,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            name: name.to_string(),
            role,
            description: format!("{} agent", role),
            capabilities,
            provider,
            timeout: None,
            state: Mutex::new(AgentState::default()),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Bound every provider call made by this agent.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    // State holds only counters and append-only logs, so a poisoned
    // lock is still consistent enough to keep reading.
    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn can_perform(&self, task: &Task) -> bool {
        task.required_capabilities.is_subset(&self.capabilities)
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.state().current_task
    }

    pub fn is_busy(&self) -> bool {
        self.current_task().is_some()
    }

    /// Claim the task and start it.
    ///
    /// Fails with `CapabilityMismatch` if the agent lacks a required
    /// capability, `AgentBusy` if it already holds a task.
    pub fn assign(&self, task: &mut Task) -> Result<()> {
        if !self.can_perform(task) {
            return Err(Error::CapabilityMismatch {
                agent: self.name.clone(),
                task: task.name.clone(),
                missing: task
                    .required_capabilities
                    .missing_from(&self.capabilities)
                    .to_string(),
            });
        }

        let mut state = self.state();
        if let Some(current) = state.current_task {
            return Err(Error::AgentBusy {
                agent: self.name.clone(),
                current,
            });
        }
        task.start()?;
        task.agent_id = Some(self.id);
        state.current_task = Some(task.id);
        alog_debug!("Agent {} assigned task {} ({})", self.name, task.name, task.id.short());
        Ok(())
    }

    /// Run the task through the provider.
    ///
    /// The call is bounded by the agent's timeout and aborted when `cancel`
    /// fires. Does not change task or agent state; callers follow up with
    /// [`Agent::complete_task`] or [`Agent::fail_task`].
    pub async fn execute_task(
        &self,
        task: &Task,
        cancel: Option<&CancellationToken>,
    ) -> Result<TaskOutput> {
        let call = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.provider.execute(task))
                    .await
                    .unwrap_or(Err(Error::Timeout(limit))),
                None => self.provider.execute(task).await,
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = call => result,
            },
            None => call.await,
        }
    }

    fn ensure_current(&self, state: &AgentState, task: &Task) -> Result<()> {
        if state.current_task != Some(task.id) {
            return Err(Error::TaskNotAssigned {
                agent: self.name.clone(),
                task: task.id,
            });
        }
        Ok(())
    }

    /// Finish the current task successfully.
    pub fn complete_task(&self, task: &mut Task, output: &TaskOutput) -> Result<()> {
        let mut state = self.state();
        self.ensure_current(&state, task)?;
        task.complete(output.data.clone())?;
        for recommendation in &output.recommendations {
            task.add_recommendation(recommendation)?;
        }
        state.current_task = None;

        state.tasks_completed += 1;
        state.total_execution += elapsed(task);
        state
            .memory
            .remember_episode(task.snapshot(), EpisodeOutcome::Result(output.data.clone()));
        state.task_history.push(task.clone());
        alog_debug!("Agent {} completed task {}", self.name, task.name);
        Ok(())
    }

    /// Finish the current task with an error.
    ///
    /// A `Cancelled` error leaves the task in `Cancelled`; anything else in
    /// `Failed`. Both count against the agent's success rate.
    pub fn fail_task(&self, task: &mut Task, error: &Error) -> Result<()> {
        let mut state = self.state();
        self.ensure_current(&state, task)?;
        match error {
            Error::Cancelled => task.cancel()?,
            other => task.fail(&other.to_string())?,
        }
        state.current_task = None;

        state.tasks_failed += 1;
        state.total_execution += elapsed(task);
        state
            .memory
            .remember_episode(task.snapshot(), EpisodeOutcome::Error(error.to_string()));
        state.task_history.push(task.clone());
        alog_warn!("Agent {} failed task {}: {}", self.name, task.name, error);
        Ok(())
    }

    pub fn tasks_completed(&self) -> u32 {
        self.state().tasks_completed
    }

    pub fn tasks_failed(&self) -> u32 {
        self.state().tasks_failed
    }

    pub fn success_rate(&self) -> f64 {
        let state = self.state();
        success_rate(state.tasks_completed, state.tasks_failed)
    }

    pub fn get_performance_metrics(&self) -> AgentMetrics {
        let state = self.state();
        let total_tasks = state.tasks_completed + state.tasks_failed;
        let average_execution_ms = if total_tasks > 0 {
            (state.total_execution.as_millis() / total_tasks as u128) as u64
        } else {
            0
        };
        AgentMetrics {
            agent_id: self.id,
            agent_name: self.name.clone(),
            role: self.role,
            tasks_completed: state.tasks_completed,
            tasks_failed: state.tasks_failed,
            total_tasks,
            success_rate: success_rate(state.tasks_completed, state.tasks_failed),
            average_execution_ms,
        }
    }

    /// Finished tasks, oldest first.
    pub fn task_history(&self) -> Vec<Task> {
        self.state().task_history.clone()
    }

    /// Recommendations collected from every finished task.
    pub fn get_recommendations(&self) -> Vec<String> {
        self.state()
            .task_history
            .iter()
            .flat_map(|t| t.recommendations.iter().cloned())
            .collect()
    }

    /// Read or update the agent's memory under its lock.
    pub fn with_memory<R>(&self, f: impl FnOnce(&mut AgentMemory) -> R) -> R {
        f(&mut self.state().memory)
    }
}

fn success_rate(completed: u32, failed: u32) -> f64 {
    completed as f64 / (completed + failed).max(1) as f64
}

fn elapsed(task: &Task) -> Duration {
    task.elapsed()
        .and_then(|d| d.to_std().ok())
        .unwrap_or_default()
}
