//! Per-agent memory.
//!
//! Three stores with different retention rules:
//! - short-term: keyed, overwritten on write, clearable
//! - long-term: append-only notes, searchable by keyword
//! - episodic: append-only record of task outcomes, used for audit

use crate::core::task::TaskSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    fn now(value: Value) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
        }
    }
}

/// How a remembered task ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum EpisodeOutcome {
    Result(Value),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub task: TaskSnapshot,
    pub outcome: EpisodeOutcome,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    short_term: HashMap<String, MemoryEntry>,
    long_term: Vec<MemoryEntry>,
    episodic: Vec<Episode>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember_short_term(&mut self, key: &str, value: Value) {
        self.short_term.insert(key.to_string(), MemoryEntry::now(value));
    }

    pub fn recall_short_term(&self, key: &str) -> Option<&Value> {
        self.short_term.get(key).map(|entry| &entry.value)
    }

    /// The only deletion the memory supports.
    pub fn clear_short_term(&mut self) {
        self.short_term.clear();
    }

    pub fn remember_long_term(&mut self, value: Value) {
        self.long_term.push(MemoryEntry::now(value));
    }

    pub fn long_term(&self) -> &[MemoryEntry] {
        &self.long_term
    }

    /// Case-insensitive keyword search over long-term entries.
    ///
    /// Object entries match when any field value contains the query;
    /// other values match on their own rendering.
    pub fn search_long_term(&self, query: &str) -> Vec<&MemoryEntry> {
        let needle = query.to_lowercase();
        self.long_term
            .iter()
            .filter(|entry| match &entry.value {
                Value::Object(map) => map
                    .values()
                    .any(|v| render(v).to_lowercase().contains(&needle)),
                other => render(other).to_lowercase().contains(&needle),
            })
            .collect()
    }

    pub fn remember_episode(&mut self, task: TaskSnapshot, outcome: EpisodeOutcome) {
        let success = matches!(outcome, EpisodeOutcome::Result(_));
        self.episodic.push(Episode {
            task,
            outcome,
            success,
            timestamp: Utc::now(),
        });
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodic
    }

    /// Fraction of successful episodes, 0.0 when there are none.
    pub fn episodic_success_rate(&self) -> f64 {
        let successes = self.episodic.iter().filter(|e| e.success).count();
        successes as f64 / self.episodic.len().max(1) as f64
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
