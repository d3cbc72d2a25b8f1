//! Phase registry and execution.
//!
//! Phases are registered once, then executed any number of times, possibly
//! concurrently from different tasks. The only state shared between
//! executions is the append-only history.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::PhaseEvent;
use super::team::{Team, TeamPerformance};
use crate::config::Config;
use crate::core::capability::CapabilitySet;
use crate::core::task::{Priority, Task};
use crate::error::{Error, Result};
use crate::workflow::{ValidationOutcome, WorkflowEngine, WorkflowGraph};
use crate::{alog, alog_debug, alog_error, alog_warn};

/// Output key for the serialized workflow state.
pub const WORKFLOW_OUTPUT: &str = "workflow";
/// Output key for the collaborative task's result.
pub const COLLABORATIVE_OUTPUT: &str = "collaborative";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Workflow,
    CollaborativeTeam,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Workflow => write!(f, "workflow"),
            ExecutionMode::CollaborativeTeam => write!(f, "collaborative_team"),
        }
    }
}

/// Overall verdict for one phase execution.
///
/// `Partial` covers any run that produced output but also recorded errors,
/// forced its validation through the iteration cap, or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Partial,
    Failed,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Partial => write!(f, "partial"),
            PhaseStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub use_workflow: bool,
    pub use_collaborative_team: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            use_workflow: true,
            use_collaborative_team: false,
            cancel: None,
        }
    }
}

impl ExecuteOptions {
    pub fn workflow() -> Self {
        Self::default()
    }

    pub fn collaborative() -> Self {
        Self {
            use_workflow: false,
            use_collaborative_team: true,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Consolidated result of one `execute_phase` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseExecutionReport {
    pub phase: String,
    pub execution_modes: Vec<ExecutionMode>,
    pub outputs: Map<String, Value>,
    pub recommendations: Vec<String>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub status: PhaseStatus,
    pub validation: ValidationOutcome,
    pub cancelled: bool,
}

/// One entry in the orchestrator's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub phase: String,
    pub timestamp: DateTime<Utc>,
    pub execution_modes: Vec<ExecutionMode>,
    pub duration_ms: u64,
    pub status: PhaseStatus,
    pub validation: ValidationOutcome,
    pub recommendations: Vec<String>,
    pub errors: Vec<String>,
}

impl ExecutionRecord {
    fn from_report(report: &PhaseExecutionReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            phase: report.phase.clone(),
            timestamp,
            execution_modes: report.execution_modes.clone(),
            duration_ms: report.duration_ms,
            status: report.status,
            validation: report.validation,
            recommendations: report.recommendations.clone(),
            errors: report.errors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_executions: usize,
    pub total_duration_ms: u64,
    pub average_duration_ms: f64,
    pub workflow_executions: usize,
    pub collaborative_executions: usize,
    pub forced_terminations: usize,
    pub total_recommendations: usize,
    pub teams: BTreeMap<String, TeamPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub phases_registered: usize,
    /// Distinct phases with at least one execution on record.
    pub phases_executed: usize,
    pub executions: usize,
    pub recommendations_total: usize,
    pub per_phase_performance: BTreeMap<String, TeamPerformance>,
}

/// On-disk audit log written by [`Orchestrator::save_execution_log`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub executions: Vec<ExecutionRecord>,
    pub recommendations: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsSummary {
    pub total_executions: usize,
    pub average_duration_ms: f64,
    pub recommendations_generated: usize,
    pub workflow_executions: usize,
    pub collaborative_executions: usize,
    pub forced_terminations: usize,
}

/// What this orchestrator is set up to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorCapabilities {
    pub phases: Vec<String>,
    /// Registered phases that carry a workflow graph.
    pub workflow_phases: Vec<String>,
    pub max_iterations: u32,
}

/// Consolidated view over everything the orchestrator has run so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsReport {
    pub summary: InsightsSummary,
    pub recommendations: Vec<String>,
    pub agent_performance: BTreeMap<String, TeamPerformance>,
    pub execution_history: Vec<ExecutionRecord>,
    pub capabilities: OrchestratorCapabilities,
}

struct Phase {
    team: Arc<Team>,
    workflow: Option<WorkflowGraph>,
}

pub struct Orchestrator {
    config: Config,
    phases: BTreeMap<String, Phase>,
    history: Mutex<VecDeque<ExecutionRecord>>,
    events: Option<mpsc::Sender<PhaseEvent>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phases: BTreeMap::new(),
            history: Mutex::new(VecDeque::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<PhaseEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a phase. Each name can be registered once.
    pub fn register_phase(
        &mut self,
        name: &str,
        team: Arc<Team>,
        workflow: Option<WorkflowGraph>,
    ) -> Result<()> {
        if self.phases.contains_key(name) {
            return Err(Error::DuplicatePhase(name.to_string()));
        }
        alog!(
            "Registered phase {} (team {}, {} agents, workflow: {})",
            name,
            team.name(),
            team.agents().len(),
            workflow.is_some()
        );
        self.phases.insert(name.to_string(), Phase { team, workflow });
        Ok(())
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.keys().map(String::as_str).collect()
    }

    pub fn team(&self, phase: &str) -> Option<&Arc<Team>> {
        self.phases.get(phase).map(|p| &p.team)
    }

    pub fn workflow(&self, phase: &str) -> Option<&WorkflowGraph> {
        self.phases.get(phase).and_then(|p| p.workflow.as_ref())
    }

    async fn emit(&self, event: PhaseEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Run a registered phase in the requested modes.
    ///
    /// Only setup errors (an unknown phase) are returned as `Err`; anything
    /// that goes wrong during execution lands in the report's `errors`.
    pub async fn execute_phase(
        &self,
        name: &str,
        context: Map<String, Value>,
        options: ExecuteOptions,
    ) -> Result<PhaseExecutionReport> {
        let Some(phase) = self.phases.get(name) else {
            alog_error!("Cannot execute unknown phase {}", name);
            return Err(Error::UnknownPhase(name.to_string()));
        };

        alog!("Executing phase {}", name);
        self.emit(PhaseEvent::PhaseStarted {
            phase: name.to_string(),
        })
        .await;

        let started = Instant::now();
        let timestamp = Utc::now();
        let cancel = options.cancel.clone();
        let is_cancelled = || cancel.as_ref().is_some_and(|c| c.is_cancelled());

        let mut report = PhaseExecutionReport {
            phase: name.to_string(),
            execution_modes: Vec::new(),
            outputs: Map::new(),
            recommendations: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
            status: PhaseStatus::Completed,
            validation: ValidationOutcome::NotReached,
            cancelled: false,
        };
        let mut artifacts = context.clone();

        match (&phase.workflow, options.use_workflow) {
            (Some(graph), true) => {
                let mut engine = WorkflowEngine::new(graph, &phase.team)
                    .with_max_iterations(self.config.max_iterations);
                if let Some(tx) = &self.events {
                    engine = engine.with_events(tx.clone());
                }
                if let Some(token) = &cancel {
                    engine = engine.with_cancellation(token.clone());
                }
                let state = engine.run(context).await;

                report.execution_modes.push(ExecutionMode::Workflow);
                report.recommendations.extend(state.recommendations.iter().cloned());
                report.errors.extend(state.errors.iter().cloned());
                report.validation = state.validation_outcome();
                report.cancelled |= state.cancelled;
                artifacts = state.artifacts.clone();
                insert_workflow_output(&mut report, serde_json::to_value(&state));
            }
            (None, true) => alog_debug!("Phase {} has no workflow graph; skipping", name),
            _ => {}
        }

        if options.use_collaborative_team {
            if is_cancelled() {
                report.cancelled = true;
                report
                    .errors
                    .push("Collaborative task cancelled before start".to_string());
            } else {
                report.execution_modes.push(ExecutionMode::CollaborativeTeam);
                self.run_collaborative(name, &phase.team, artifacts, cancel.as_ref(), &mut report)
                    .await;
            }
        }

        if report.execution_modes.is_empty() && !report.cancelled {
            report
                .errors
                .push(format!("No execution mode ran for phase {}", name));
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report.status = classify(&report);
        self.record(ExecutionRecord::from_report(&report, timestamp));

        match report.status {
            PhaseStatus::Completed => alog!("Phase {} completed in {}ms", name, report.duration_ms),
            status => alog_warn!(
                "Phase {} finished {} in {}ms with {} errors",
                name,
                status,
                report.duration_ms,
                report.errors.len()
            ),
        }
        self.emit(PhaseEvent::PhaseCompleted {
            phase: name.to_string(),
            status: report.status,
            duration: started.elapsed(),
        })
        .await;
        Ok(report)
    }

    /// One consolidated task for the whole team, routed like any other.
    async fn run_collaborative(
        &self,
        phase: &str,
        team: &Team,
        mut artifacts: Map<String, Value>,
        cancel: Option<&CancellationToken>,
        report: &mut PhaseExecutionReport,
    ) {
        artifacts.insert("phase".to_string(), json!(phase));
        let mut task = Task::new(&format!("{} collaborative review", phase), CapabilitySet::new())
            .with_description(&format!(
                "Joint deliverables for {} from team {}",
                phase,
                team.name()
            ))
            .with_priority(Priority::High)
            .with_context(artifacts);

        match team.execute_task(&mut task, cancel).await {
            Ok((agent, output)) => {
                alog_debug!("Collaborative task for {} handled by {}", phase, agent.name());
                report
                    .outputs
                    .insert(COLLABORATIVE_OUTPUT.to_string(), output.data);
                report.recommendations.extend(task.recommendations);
            }
            Err(e) => {
                if matches!(e, Error::Cancelled) {
                    report.cancelled = true;
                }
                alog_warn!("Collaborative task for {} failed: {}", phase, e);
                report.errors.push(format!("Collaborative task failed: {}", e));
            }
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<ExecutionRecord>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, record: ExecutionRecord) {
        let mut history = self.history();
        history.push_back(record);
        if let Some(limit) = self.config.history_limit {
            while history.len() > limit {
                history.pop_front();
            }
        }
    }

    /// Snapshot of the retained history, oldest first.
    pub fn execution_history(&self) -> Vec<ExecutionRecord> {
        self.history().iter().cloned().collect()
    }

    pub fn get_recommendations(&self) -> Vec<String> {
        self.history()
            .iter()
            .flat_map(|r| r.recommendations.iter().cloned())
            .collect()
    }

    fn team_performance(&self) -> BTreeMap<String, TeamPerformance> {
        self.phases
            .iter()
            .map(|(name, phase)| (name.clone(), phase.team.get_team_performance()))
            .collect()
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        let history = self.execution_history();
        let total_duration_ms: u64 = history.iter().map(|r| r.duration_ms).sum();
        let count_mode = |mode: ExecutionMode| {
            history
                .iter()
                .filter(|r| r.execution_modes.contains(&mode))
                .count()
        };

        PerformanceMetrics {
            total_executions: history.len(),
            total_duration_ms,
            average_duration_ms: if history.is_empty() {
                0.0
            } else {
                total_duration_ms as f64 / history.len() as f64
            },
            workflow_executions: count_mode(ExecutionMode::Workflow),
            collaborative_executions: count_mode(ExecutionMode::CollaborativeTeam),
            forced_terminations: history
                .iter()
                .filter(|r| matches!(r.validation, ValidationOutcome::ForcedAfterCap { .. }))
                .count(),
            total_recommendations: history.iter().map(|r| r.recommendations.len()).sum(),
            teams: self.team_performance(),
        }
    }

    pub fn get_progress_summary(&self) -> ProgressSummary {
        let history = self.execution_history();
        let mut executed: Vec<&str> = history.iter().map(|r| r.phase.as_str()).collect();
        executed.sort_unstable();
        executed.dedup();

        ProgressSummary {
            phases_registered: self.phases.len(),
            phases_executed: executed.len(),
            executions: history.len(),
            recommendations_total: history.iter().map(|r| r.recommendations.len()).sum(),
            per_phase_performance: self.team_performance(),
        }
    }

    pub fn insights_report(&self) -> InsightsReport {
        let metrics = self.get_performance_metrics();
        let recommendations = self.get_recommendations();

        InsightsReport {
            summary: InsightsSummary {
                total_executions: metrics.total_executions,
                average_duration_ms: metrics.average_duration_ms,
                recommendations_generated: recommendations.len(),
                workflow_executions: metrics.workflow_executions,
                collaborative_executions: metrics.collaborative_executions,
                forced_terminations: metrics.forced_terminations,
            },
            recommendations,
            agent_performance: metrics.teams,
            execution_history: self.execution_history(),
            capabilities: OrchestratorCapabilities {
                phases: self.phases.keys().cloned().collect(),
                workflow_phases: self
                    .phases
                    .iter()
                    .filter(|(_, p)| p.workflow.is_some())
                    .map(|(name, _)| name.clone())
                    .collect(),
                max_iterations: self.config.max_iterations,
            },
        }
    }

    /// Write the history, recommendations and metrics as pretty JSON.
    pub fn save_execution_log(&self, path: &Path) -> Result<()> {
        let log = ExecutionLog {
            executions: self.execution_history(),
            recommendations: self.get_recommendations(),
            performance_metrics: self.get_performance_metrics(),
            timestamp: Utc::now(),
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&log)?)?;
        alog!("Execution log saved to {}", path.display());
        Ok(())
    }
}

/// A state that fails to serialize is reported, never fatal to the phase.
fn insert_workflow_output(report: &mut PhaseExecutionReport, state: serde_json::Result<Value>) {
    match state {
        Ok(value) => {
            report.outputs.insert(WORKFLOW_OUTPUT.to_string(), value);
        }
        Err(e) => {
            alog_warn!("Could not serialize workflow state for {}: {}", report.phase, e);
            report
                .errors
                .push(format!("Workflow state not serialized: {}", e));
        }
    }
}

fn classify(report: &PhaseExecutionReport) -> PhaseStatus {
    if report.outputs.is_empty() {
        return PhaseStatus::Failed;
    }
    let forced = matches!(report.validation, ValidationOutcome::ForcedAfterCap { .. });
    if report.errors.is_empty() && !forced && !report.cancelled {
        PhaseStatus::Completed
    } else {
        PhaseStatus::Partial
    }
}
