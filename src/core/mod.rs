//! Core domain models for archon.
//!
//! Capabilities, tasks and agent memory: the data that flows between
//! agents, teams and workflows.

pub mod capability;
pub mod memory;
pub mod task;

pub use capability::{AgentRole, Capability, CapabilitySet};
pub use memory::{AgentMemory, Episode, EpisodeOutcome, MemoryEntry};
pub use task::{Priority, Task, TaskId, TaskSnapshot, TaskStatus};
