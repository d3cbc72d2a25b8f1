//! Orchestrator integration tests against the ADM presets.

use std::sync::Arc;

use serde_json::{json, Map};
use tempfile::TempDir;

use archon::adm::{self, PHASE_A, PHASE_B};
use archon::orchestration::{
    ExecuteOptions, ExecutionLog, ExecutionMode, PhaseStatus, COLLABORATIVE_OUTPUT, WORKFLOW_OUTPUT,
};
use archon::workflow::{ValidationOutcome, WorkflowState};
use archon::{AnalyzerProvider, Config, Error};

use crate::fixtures::ScriptedProvider;

fn both_modes() -> ExecuteOptions {
    ExecuteOptions {
        use_workflow: true,
        use_collaborative_team: true,
        cancel: None,
    }
}

/// Phase A with the offline analyzer passes validation first time
#[tokio::test]
async fn test_phase_a_with_analyzer() {
    let orch = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &Config::default()).unwrap();
    let mut context = Map::new();
    context.insert("enterprise".to_string(), json!("Acme Retail"));

    let report = orch.execute_phase(PHASE_A, context, ExecuteOptions::workflow()).await.unwrap();

    assert_eq!(report.status, PhaseStatus::Completed);
    assert_eq!(report.validation, ValidationOutcome::Passed { iterations: 1 });
    assert!(report.errors.is_empty());
    assert_eq!(report.recommendations.len(), 5);

    let state: WorkflowState = serde_json::from_value(report.outputs[WORKFLOW_OUTPUT].clone()).unwrap();
    assert_eq!(
        state.completed_steps,
        vec![
            "define_vision",
            "identify_stakeholders",
            "establish_principles",
            "capture_requirements",
            "validate",
            "generate_deliverables",
        ]
    );
    assert_eq!(state.artifacts["enterprise"], json!("Acme Retail"));
    assert_eq!(state.artifacts["deliverable"], json!("Architecture Vision"));
    assert!(state.artifacts.contains_key("define_vision_summary"));
}

/// Both modes combine and the collaborative task goes to the team lead
#[tokio::test]
async fn test_phase_b_both_modes() {
    let provider = Arc::new(ScriptedProvider::new());
    let orch = adm::standard_orchestrator(provider.clone(), &Config::default()).unwrap();

    let report = orch.execute_phase(PHASE_B, Map::new(), both_modes()).await.unwrap();

    assert_eq!(
        report.execution_modes,
        vec![ExecutionMode::Workflow, ExecutionMode::CollaborativeTeam]
    );
    assert!(report.outputs.contains_key(WORKFLOW_OUTPUT));
    assert_eq!(
        report.outputs[COLLABORATIVE_OUTPUT],
        json!({"step": "Phase B collaborative review"})
    );
    let team = orch.team(PHASE_B).unwrap();
    let lead = team.lead().unwrap();
    assert_eq!(lead.name(), "Business Architect");
    // Four workflow steps plus the collaborative task.
    assert_eq!(lead.tasks_completed(), 5);
}

/// A failing gap analysis in Phase B retries from capability modelling
#[tokio::test]
async fn test_phase_b_retry_target() {
    let provider = Arc::new(ScriptedProvider::failing(&["perform_gap_analysis"]));
    let orch = adm::standard_orchestrator(provider.clone(), &Config::default()).unwrap();

    let report = orch.execute_phase(PHASE_B, Map::new(), ExecuteOptions::workflow()).await.unwrap();

    assert_eq!(report.status, PhaseStatus::Partial);
    assert_eq!(report.validation, ValidationOutcome::ForcedAfterCap { iterations: 3 });
    assert_eq!(report.errors.len(), 3);
    assert_eq!(provider.call_count("model_capabilities"), 3);
    assert_eq!(provider.call_count("validate"), 3);
}

/// Iteration cap comes from the configuration
#[tokio::test]
async fn test_configured_cap_is_used() {
    let provider = Arc::new(ScriptedProvider::failing(&["capture_requirements"]));
    let config = Config {
        max_iterations: 5,
        ..Config::default()
    };
    let orch = adm::standard_orchestrator(provider.clone(), &config).unwrap();

    let report = orch.execute_phase(PHASE_A, Map::new(), ExecuteOptions::workflow()).await.unwrap();

    assert_eq!(report.validation, ValidationOutcome::ForcedAfterCap { iterations: 5 });
    assert_eq!(provider.call_count("capture_requirements"), 5);
    assert_eq!(provider.call_count("define_vision"), 1);
}

#[tokio::test]
async fn test_unknown_phase() {
    let orch = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &Config::default()).unwrap();
    let result = orch.execute_phase("Phase H", Map::new(), ExecuteOptions::workflow()).await;
    assert!(matches!(result, Err(Error::UnknownPhase(name)) if name == "Phase H"));
}

#[test]
fn test_duplicate_registration() {
    let mut orch = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &Config::default()).unwrap();
    let team = Arc::clone(orch.team(PHASE_A).unwrap());
    let result = orch.register_phase(PHASE_A, team, None);
    assert!(matches!(result, Err(Error::DuplicatePhase(_))));
}

/// History, metrics and the saved log cover every execution
#[tokio::test]
async fn test_history_metrics_and_log() {
    let orch = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &Config::default()).unwrap();
    orch.execute_phase(PHASE_A, Map::new(), ExecuteOptions::workflow()).await.unwrap();
    orch.execute_phase(PHASE_B, Map::new(), both_modes()).await.unwrap();

    let history = orch.execution_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].phase, PHASE_A);
    assert!(history[0].timestamp <= history[1].timestamp);

    let metrics = orch.get_performance_metrics();
    assert_eq!(metrics.total_executions, 2);
    assert_eq!(metrics.workflow_executions, 2);
    assert_eq!(metrics.collaborative_executions, 1);
    assert_eq!(metrics.total_recommendations, orch.get_recommendations().len());
    assert_eq!(metrics.teams.len(), 2);

    let summary = orch.get_progress_summary();
    assert_eq!(summary.phases_registered, 2);
    assert_eq!(summary.phases_executed, 2);
    assert_eq!(summary.recommendations_total, metrics.total_recommendations);
    // The shared reviewer validated once in each phase.
    let reviewer = summary.per_phase_performance[PHASE_A]
        .agents
        .iter()
        .find(|a| a.agent_name == "Quality Reviewer")
        .unwrap();
    assert_eq!(reviewer.tasks_completed, 2);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("adm_log.json");
    orch.save_execution_log(&path).unwrap();
    let log: ExecutionLog = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(log.executions, history);
    assert_eq!(log.performance_metrics.total_executions, 2);
}

/// The insights report agrees with the metrics and records a forced pass
#[tokio::test]
async fn test_insights_report() {
    let provider = Arc::new(ScriptedProvider::failing(&["capture_requirements"]));
    let orch = adm::standard_orchestrator(provider, &Config::default()).unwrap();
    orch.execute_phase(PHASE_A, Map::new(), ExecuteOptions::workflow()).await.unwrap();
    orch.execute_phase(PHASE_B, Map::new(), ExecuteOptions::collaborative()).await.unwrap();

    let report = orch.insights_report();
    let metrics = orch.get_performance_metrics();

    assert_eq!(report.summary.total_executions, 2);
    assert_eq!(report.summary.forced_terminations, 1);
    assert_eq!(report.summary.workflow_executions, 1);
    assert_eq!(report.summary.collaborative_executions, 1);
    assert_eq!(report.summary.recommendations_generated, metrics.total_recommendations);
    assert_eq!(report.agent_performance, metrics.teams);
    assert_eq!(report.execution_history, orch.execution_history());
    assert_eq!(report.capabilities.phases, vec![PHASE_A, PHASE_B]);
    assert_eq!(report.capabilities.workflow_phases, vec![PHASE_A, PHASE_B]);
    assert_eq!(report.capabilities.max_iterations, Config::default().max_iterations);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["total_executions"], 2);
}
