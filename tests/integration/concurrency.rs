//! Cross-phase concurrency integration tests.
//!
//! Phases may run at the same time on different tasks. They share only
//! the orchestrator history and any agent that sits in more than one team.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tokio_util::sync::CancellationToken;

use archon::adm::{self, PHASE_A, PHASE_B};
use archon::core::{AgentRole, Capability, Task};
use archon::orchestration::{ExecuteOptions, Orchestrator, PhaseStatus};
use archon::provider::TaskOutput;
use archon::{Config, Error};

use crate::fixtures::{agent, caps, review_graph, team_of, ScriptedProvider, ALL_STEP_CAPS};

/// Two phases run concurrently and both land in the history
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_phases_run_concurrently() {
    let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_millis(5)));
    let orch = Arc::new(adm::standard_orchestrator(provider, &Config::default()).unwrap());

    let handles: Vec<_> = [PHASE_A, PHASE_B]
        .into_iter()
        .map(|phase| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.execute_phase(phase, Map::new(), ExecuteOptions::workflow())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        // The shared reviewer may be busy with the other phase's review;
        // that is the only failure either phase can see.
        assert!(report
            .errors
            .iter()
            .all(|e| e.contains("is busy with task")));
        assert_ne!(report.status, PhaseStatus::Failed);
    }

    assert_eq!(orch.execution_history().len(), 2);
    for team_phase in [PHASE_A, PHASE_B] {
        let team = orch.team(team_phase).unwrap();
        assert!(team.agents().iter().all(|a| !a.is_busy()));
    }
}

/// A busy shared agent fails fast instead of queueing
#[tokio::test]
async fn test_busy_shared_agent_fails_fast() {
    let provider = Arc::new(ScriptedProvider::new());
    let shared = agent("Shared", &ALL_STEP_CAPS, provider);
    let team = Arc::new(team_of(&[Arc::clone(&shared)]));
    let mut orch = Orchestrator::new(Config::default());
    orch.register_phase("Phase T", Arc::clone(&team), Some(review_graph("Phase T")))
        .unwrap();

    // Another phase holds the agent.
    let mut held = Task::new("elsewhere", caps(&[]));
    shared.assign(&mut held).unwrap();

    let report = orch
        .execute_phase("Phase T", Map::new(), ExecuteOptions::workflow())
        .await
        .unwrap();

    assert_eq!(report.status, PhaseStatus::Partial);
    assert!(report.errors.iter().all(|e| e.contains("is busy with task")));
    assert!(report.errors.iter().any(|e| e.starts_with("Step collect failed")));
    assert_eq!(shared.tasks_failed(), 0);

    shared.complete_task(&mut held, &TaskOutput::default()).unwrap();
    assert!(!shared.is_busy());
}

/// Direct routing from a second team sees the contention
#[test]
fn test_second_team_sees_agent_busy() {
    let provider = Arc::new(ScriptedProvider::new());
    let shared = agent("Shared", &[Capability::ValidateQuality], provider);
    let first = team_of(&[Arc::clone(&shared)]);
    let second = team_of(&[Arc::clone(&shared)]);

    let mut a = Task::new("review_a", caps(&[Capability::ValidateQuality]));
    first.route_task(&mut a).unwrap();
    let mut b = Task::new("review_b", caps(&[Capability::ValidateQuality]));
    let err = second.route_task(&mut b).unwrap_err();

    assert!(matches!(err, Error::AgentBusy { current, .. } if current == a.id));
    assert!(err.is_retryable());
}

/// Cancelling a running phase stops it and marks the report
#[tokio::test]
async fn test_cancel_running_phase() {
    let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_millis(300)));
    let worker = Arc::new(archon::Agent::new(
        "Worker",
        AgentRole::SolutionArchitect,
        caps(&ALL_STEP_CAPS),
        provider,
    ));
    let mut orch = Orchestrator::new(Config::default());
    orch.register_phase(
        "Phase T",
        Arc::new(team_of(&[Arc::clone(&worker)])),
        Some(review_graph("Phase T")),
    )
    .unwrap();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let report = orch
        .execute_phase(
            "Phase T",
            Map::new(),
            ExecuteOptions::workflow().with_cancellation(token),
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, PhaseStatus::Partial);
    assert_eq!(worker.tasks_failed(), 1);
    assert_eq!(orch.execution_history().len(), 1);
}
