//! Full workflow walk integration tests.
//!
//! These tests run the engine against real teams to check retry
//! behaviour, the iteration cap and graceful degradation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use archon::agent::Agent;
use archon::core::{AgentRole, Capability};
use archon::orchestration::PhaseEvent;
use archon::workflow::{WorkflowEngine, WorkflowState};

use crate::fixtures::{agent, caps, review_graph, team_of, ScriptedProvider, ALL_STEP_CAPS};

/// Scenario: validation never passes
/// Given a step the validation requires always fails, cap 3
/// When the workflow runs
/// Then the retry target runs at most 3 times and the pass edge is forced
#[tokio::test]
async fn test_validation_never_passes_forces_terminal() {
    let provider = Arc::new(ScriptedProvider::failing(&["analyze"]));
    let team = team_of(&[agent("All", &ALL_STEP_CAPS, Arc::clone(&provider))]);
    let graph = review_graph("Phase C");

    let state = WorkflowEngine::new(&graph, &team)
        .with_max_iterations(3)
        .run(Map::new())
        .await;

    assert_eq!(provider.call_count("analyze"), 3);
    assert_eq!(provider.call_count("review"), 3);
    assert_eq!(state.iteration, 3);
    assert!(!state.validation_passed);
    assert!(state.forced_termination);
    assert!(state.is_finished());
    assert_eq!(state.completed_steps.last().map(String::as_str), Some("publish"));
}

/// Scenario: a step's agent always throws
/// Given the agent owning the first step fails every task
/// When the workflow runs
/// Then the failure is recorded once, counted against the agent, and the walk continues
#[tokio::test]
async fn test_failing_agent_degrades_gracefully() {
    let broken_provider = Arc::new(ScriptedProvider::failing(&["collect"]));
    let broken = agent("Broken", &[Capability::AnalyzeRequirements], broken_provider);
    let good = agent(
        "Good",
        &[Capability::AnalyzeGaps, Capability::ValidateQuality],
        Arc::new(ScriptedProvider::new()),
    );
    let team = team_of(&[Arc::clone(&broken), Arc::clone(&good)]);
    let graph = review_graph("Phase D");

    let state = WorkflowEngine::new(&graph, &team).run(Map::new()).await;

    assert_eq!(broken.tasks_failed(), 1);
    assert!(!broken.is_busy());
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("Step collect failed"));
    assert!(state.agent_outputs.contains_key("analyze"));
    assert!(!state.agent_outputs.contains_key("collect"));
    assert_eq!(&state.completed_steps[..2], ["analyze", "review"]);
    assert!(state.is_finished());
}

/// Property: every walk terminates within the invocation bound
#[tokio::test]
async fn test_termination_for_any_cap() {
    let graph = review_graph("Phase T");
    for cap in 1..=6u32 {
        let provider = Arc::new(ScriptedProvider::failing(&["analyze"]));
        let team = team_of(&[agent("All", &ALL_STEP_CAPS, Arc::clone(&provider))]);

        let state = WorkflowEngine::new(&graph, &team)
            .with_max_iterations(cap)
            .run(Map::new())
            .await;

        assert!(state.is_finished(), "cap {} did not finish", cap);
        assert_eq!(state.iteration, cap);
        assert_eq!(provider.call_count("analyze") as u32, cap);
        assert!(state.steps_executed <= graph.max_step_invocations(cap));
    }
}

/// Property: iteration increases by exactly one per validation visit
#[tokio::test]
async fn test_iteration_strictly_increases() {
    let provider = Arc::new(ScriptedProvider::failing(&["analyze"]));
    let team = team_of(&[agent("All", &ALL_STEP_CAPS, provider)]);
    let graph = review_graph("Phase T");
    let (tx, mut rx) = mpsc::channel(128);

    WorkflowEngine::new(&graph, &team)
        .with_max_iterations(4)
        .with_events(tx)
        .run(Map::new())
        .await;

    let mut iterations = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PhaseEvent::ValidationEvaluated { iteration, forced, .. } = event {
            iterations.push((iteration, forced));
        }
    }
    assert_eq!(iterations, vec![(1, false), (2, false), (3, false), (4, true)]);
}

/// A provider slower than the agent timeout is recorded as a step failure
#[tokio::test]
async fn test_step_timeout_is_recorded() {
    let slow = Arc::new(ScriptedProvider::new().with_delay(Duration::from_secs(5)));
    let slow_agent = Arc::new(
        Agent::new(
            "Slow",
            AgentRole::RiskAssessor,
            caps(&[Capability::AnalyzeRequirements]),
            slow,
        )
        .with_timeout(Duration::from_millis(20)),
    );
    let fast = agent(
        "Fast",
        &[Capability::AnalyzeGaps, Capability::ValidateQuality],
        Arc::new(ScriptedProvider::new()),
    );
    let team = team_of(&[Arc::clone(&slow_agent), fast]);
    let graph = review_graph("Phase T");

    let state = WorkflowEngine::new(&graph, &team).run(Map::new()).await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("timed out"));
    assert_eq!(slow_agent.tasks_failed(), 1);
    assert!(state.is_finished());
}

/// Cancelling mid-step aborts the walk without running later steps
#[tokio::test]
async fn test_cancellation_mid_step() {
    let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_millis(500)));
    let worker = agent("Worker", &ALL_STEP_CAPS, Arc::clone(&provider));
    let team = team_of(&[Arc::clone(&worker)]);
    let graph = review_graph("Phase T");
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let state = WorkflowEngine::new(&graph, &team)
        .with_cancellation(token)
        .run(Map::new())
        .await;

    assert!(state.cancelled);
    assert!(state.completed_steps.is_empty());
    assert_eq!(provider.calls(), vec!["collect"]);
    assert_eq!(worker.tasks_failed(), 1);
    assert!(!worker.is_busy());
    assert!(!state.is_finished());
}

/// Context flows into artifacts and survives serialization
#[tokio::test]
async fn test_state_roundtrip_after_walk() {
    let team = team_of(&[agent("All", &ALL_STEP_CAPS, Arc::new(ScriptedProvider::new()))]);
    let graph = review_graph("Phase T");
    let mut context = Map::new();
    context.insert("enterprise".to_string(), json!("Acme"));

    let state = WorkflowEngine::new(&graph, &team).run(context).await;
    let json = serde_json::to_string(&state).unwrap();
    let back: WorkflowState = serde_json::from_str(&json).unwrap();

    assert_eq!(back.artifacts, state.artifacts);
    assert_eq!(back.completed_steps, state.completed_steps);
    assert_eq!(back.recommendations, state.recommendations);
    assert_eq!(back.artifacts["enterprise"], json!("Acme"));
    assert_eq!(back.artifacts["review_artifact"], json!(true));
    assert_eq!(
        back.recommendations,
        vec!["Act on collect", "Act on analyze", "Act on review"]
    );
}
