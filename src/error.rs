use thiserror::Error;

use crate::agent::AgentId;
use crate::core::task::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid task transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Task {task} is {status}; it must be in progress or finished")]
    TaskNotActive { task: TaskId, status: TaskStatus },

    #[error("Agent {agent} cannot perform task {task}: missing {missing}")]
    CapabilityMismatch {
        agent: String,
        task: String,
        missing: String,
    },

    #[error("Agent {agent} is busy with task {current}")]
    AgentBusy { agent: String, current: TaskId },

    #[error("Agent {agent} is not assigned task {task}")]
    TaskNotAssigned { agent: String, task: TaskId },

    #[error("No agent in team {team} can perform task {task}")]
    NoCapableAgent { team: String, task: String },

    #[error("Agent {agent} is not a member of team {team}")]
    NotMember { agent: AgentId, team: String },

    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Phase already registered: {0}")]
    DuplicatePhase(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),
}

impl Error {
    /// Errors a caller may reasonably retry: contention and provider timeouts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AgentBusy { .. } | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
