//! Task data model.
//!
//! Tasks are the units of work routed to agents. Each task carries the
//! capabilities it requires and moves through a monotone lifecycle:
//! Pending -> InProgress -> {Completed | Failed}, with Blocked and
//! Cancelled reachable only from Pending or InProgress.

use crate::agent::AgentId;
use crate::core::capability::{AgentRole, CapabilitySet};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Task status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet assigned.
    #[default]
    Pending,
    /// Assigned to an agent and executing.
    InProgress,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cannot proceed. No transition leaves this state.
    Blocked,
    /// Withdrawn before finishing.
    Cancelled,
}

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// A unit of work requiring a set of capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    /// Role the task is intended for. Informational; routing uses capabilities.
    pub role: Option<AgentRole>,
    pub priority: Priority,
    pub required_capabilities: CapabilitySet,
    pub status: TaskStatus,
    /// Agent the task was assigned to, once routed.
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Input context, usually the workflow artifacts at dispatch time.
    pub context: Map<String, Value>,
    pub dependencies: Vec<TaskId>,
    pub result: Option<Value>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Task {
    /// Create a pending task requiring the given capabilities.
    pub fn new(name: &str, required_capabilities: CapabilitySet) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            description: String::new(),
            role: None,
            priority: Priority::default(),
            required_capabilities,
            status: TaskStatus::Pending,
            agent_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            context: Map::new(),
            dependencies: Vec::new(),
            result: None,
            errors: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    fn transition(&mut self, allowed: &[TaskStatus], to: TaskStatus) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Pending -> InProgress. Records the start time.
    pub fn start(&mut self) -> Result<()> {
        self.transition(&[TaskStatus::Pending], TaskStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// InProgress -> Completed. Records the completion time and result.
    pub fn complete(&mut self, result: Value) -> Result<()> {
        self.transition(&[TaskStatus::InProgress], TaskStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    /// InProgress -> Failed. Records the completion time and error.
    pub fn fail(&mut self, error: &str) -> Result<()> {
        self.transition(&[TaskStatus::InProgress], TaskStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.errors.push(error.to_string());
        Ok(())
    }

    /// {Pending, InProgress} -> Blocked.
    pub fn block(&mut self, reason: &str) -> Result<()> {
        self.transition(
            &[TaskStatus::Pending, TaskStatus::InProgress],
            TaskStatus::Blocked,
        )?;
        self.errors.push(reason.to_string());
        Ok(())
    }

    /// {Pending, InProgress} -> Cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(
            &[TaskStatus::Pending, TaskStatus::InProgress],
            TaskStatus::Cancelled,
        )?;
        self.completed_at = Some(Utc::now());
        self.errors.push(Error::Cancelled.to_string());
        Ok(())
    }

    /// Attach an audit note. Allowed while in progress or once finished.
    pub fn add_recommendation(&mut self, recommendation: &str) -> Result<()> {
        if self.status == TaskStatus::Pending {
            return Err(Error::TaskNotActive {
                task: self.id,
                status: self.status,
            });
        }
        self.recommendations.push(recommendation.to_string());
        Ok(())
    }

    /// Check if the task reached a state no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Blocked
                | TaskStatus::Cancelled
        )
    }

    /// Wall-clock time between start and completion, if both are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot::from(self)
    }
}

/// Compact copy of a task kept in episodic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub required_capabilities: CapabilitySet,
    pub priority: Priority,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recommendations: Vec<String>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            required_capabilities: task.required_capabilities.clone(),
            priority: task.priority,
            status: task.status,
            started_at: task.started_at,
            completed_at: task.completed_at,
            recommendations: task.recommendations.clone(),
        }
    }
}
