//! Capability providers.
//!
//! A provider is the backend that actually performs a task: a language
//! model call, a deterministic analyzer or a test double. Agents hold one
//! behind `Arc<dyn CapabilityProvider>` and never see what it is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::task::Task;
use crate::error::{Error, Result};

/// What a provider hands back for a finished task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Stored as the task result and under the step's agent output.
    pub data: Value,
    /// Merged into the workflow artifacts.
    #[serde(default)]
    pub artifacts: Map<String, Value>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl TaskOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_artifact(mut self, key: &str, value: Value) -> Self {
        self.artifacts.insert(key.to_string(), value);
        self
    }

    pub fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendations.push(recommendation.to_string());
        self
    }
}

#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Perform the task. Errors are recorded against the task, never retried here.
    async fn execute(&self, task: &Task) -> Result<TaskOutput>;
}

/// Provider backed by a synchronous closure.
pub struct FnProvider<F> {
    name: String,
    f: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&Task) -> Result<TaskOutput> + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

#[async_trait]
impl<F> CapabilityProvider for FnProvider<F>
where
    F: Fn(&Task) -> Result<TaskOutput> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: &Task) -> Result<TaskOutput> {
        (self.f)(task)
    }
}

/// Deterministic offline analyzer.
///
/// Summarizes the task's capabilities and the context it was given, and
/// records one artifact per task. Used by the CLI when no model backend
/// is wired in.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerProvider;

#[async_trait]
impl CapabilityProvider for AnalyzerProvider {
    fn name(&self) -> &str {
        "analyzer"
    }

    async fn execute(&self, task: &Task) -> Result<TaskOutput> {
        if task.required_capabilities.is_empty() && task.context.is_empty() {
            return Err(Error::TaskExecution(format!(
                "nothing to analyze for task {}",
                task.name
            )));
        }

        let capabilities: Vec<&str> = task
            .required_capabilities
            .iter()
            .map(|c| c.as_str())
            .collect();
        let mut context_keys: Vec<&String> = task.context.keys().collect();
        context_keys.sort();

        let summary = format!(
            "{} analyzed using {} over {} context item(s)",
            task.name,
            capabilities.join(", "),
            context_keys.len()
        );

        Ok(TaskOutput::new(json!({
            "task": task.name,
            "capabilities": capabilities,
            "context_keys": context_keys,
            "summary": summary,
        }))
        .with_artifact(&format!("{}_summary", task.name), json!(summary))
        .with_recommendation(&format!(
            "Review {} with affected stakeholders",
            task.name
        )))
    }
}
