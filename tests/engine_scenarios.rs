mod common;

use std::sync::Arc;
use std::time::Duration;

use workflow_forge::agent::arc_agent;
use workflow_forge::types::{Mode, ProjectStatus};

use common::{make_input, make_test_engine, AlwaysSucceedsAgent};

async fn wait_until_not_running(engine: &workflow_forge::engine::Engine, project_id: &str) -> ProjectStatus {
    for _ in 0..50 {
        let progress = engine.get_progress(project_id).await.unwrap();
        if progress.status != ProjectStatus::Running && progress.status != ProjectStatus::Pending {
            return progress.status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    engine.get_progress(project_id).await.unwrap().status
}

#[tokio::test]
async fn s1_discovery_healthcare_detection() {
    let (engine, _store, _approvals) = make_test_engine(vec![]);

    let input = make_input(
        "web-app",
        "patient portal",
        Some("Patient records system with HIPAA compliance, doctor scheduling"),
    );
    let context = engine.start_workflow("s1", Mode::Discovery, input).await.unwrap();

    assert_eq!(context.workflow.phases.len(), 8);
    assert_eq!(context.activated_experts[0].0, "healthcare");
    assert!(context.activated_experts[0].1 >= 0.30);

    let status = wait_until_not_running(&engine, "s1").await;
    assert_eq!(status, ProjectStatus::AwaitingApproval);

    let progress = engine.get_progress("s1").await.unwrap();
    assert_eq!(progress.current_phase.as_deref(), Some("product_design"));
}

#[tokio::test]
async fn s2_direct_api_activation_matrix() {
    let extra: Vec<Arc<dyn workflow_forge::agent::Agent>> = vec![
        arc_agent(AlwaysSucceedsAgent::new("backend_architect")),
        arc_agent(AlwaysSucceedsAgent::new("frontend_architect")),
        arc_agent(AlwaysSucceedsAgent::new("database_architect")),
        arc_agent(AlwaysSucceedsAgent::new("infrastructure_architect")),
        arc_agent(AlwaysSucceedsAgent::new("security_architect")),
    ];
    let (engine, store, _approvals) = make_test_engine(extra);

    let input = make_input("api", "a backend-only api project", None);
    let context = engine.start_workflow("s2", Mode::Direct, input).await.unwrap();
    assert_eq!(context.workflow.phases.len(), 4);
    assert!(context.activated_experts.is_empty());

    wait_until_not_running(&engine, "s2").await;

    let persisted = store.load("s2").await.unwrap().unwrap();
    let architecture = persisted.phase_results.get("architecture_design").unwrap();
    assert!(architecture.agent_results.contains_key("backend_architect"));
    assert!(architecture.agent_results.contains_key("database_architect"));
    assert!(architecture.agent_results.contains_key("infrastructure_architect"));
    assert!(architecture.agent_results.contains_key("security_architect"));
    assert!(!architecture.agent_results.contains_key("frontend_architect"));
}

#[tokio::test]
async fn s6_approval_pause_then_resume() {
    let extra: Vec<Arc<dyn workflow_forge::agent::Agent>> = vec![arc_agent(AlwaysSucceedsAgent::new("po_agent"))];
    let (engine, _store, approvals) = make_test_engine(extra);

    let input = make_input("web-app", "a small social app", Some("a social network for sharing posts"));
    engine.start_workflow("s6", Mode::Discovery, input).await.unwrap();

    let status = wait_until_not_running(&engine, "s6").await;
    assert_eq!(status, ProjectStatus::AwaitingApproval);

    let first_progress = engine.get_progress("s6").await.unwrap();
    assert_eq!(first_progress.current_phase.as_deref(), Some("product_design"));

    let gate = approvals.find_pending_for_project("s6").await.unwrap();
    assert_eq!(gate.phase, "product_design");
    approvals.approve(&gate.gate_id).await.unwrap();
    engine.resume_workflow("s6").await.unwrap();

    let second_status = wait_until_not_running(&engine, "s6").await;
    assert_eq!(second_status, ProjectStatus::AwaitingApproval);

    let second_progress = engine.get_progress("s6").await.unwrap();
    assert!(second_progress.completed_phases.contains(&"input".to_string()));
    assert!(second_progress.completed_phases.contains(&"product_design".to_string()));
    assert_ne!(second_progress.current_phase.as_deref(), Some("product_design"));
}

#[tokio::test]
async fn rejecting_a_gate_leaves_project_awaiting_approval() {
    let (engine, _store, approvals) = make_test_engine(vec![]);

    let input = make_input("web-app", "a tiny api", None);
    engine.start_workflow("s7", Mode::Direct, input).await.unwrap();

    wait_until_not_running(&engine, "s7").await;
    let progress = engine.get_progress("s7").await.unwrap();
    // Direct workflow has no approval-gated phases, so this project already
    // ran to completion; exercise rejection against a manually created gate
    // instead to isolate the approval-manager behaviour under test.
    let _ = progress;

    let gate = approvals
        .create_gate("s7", "architecture_design", workflow_forge::types::PhaseResult::skipped("test"))
        .await
        .unwrap();
    approvals.reject(&gate.gate_id, "needs another pass on the data model").await.unwrap();
    let resolved = approvals.get_gate(&gate.gate_id).await.unwrap();
    assert_eq!(resolved.status, workflow_forge::types::GateStatus::Rejected);
    assert!(approvals.find_pending_for_project("s7").await.is_none());
}

#[tokio::test]
async fn recover_interrupted_rolls_back_crashed_projects() {
    let (engine, store, _approvals) = make_test_engine(vec![]);

    let mut ctx = workflow_forge::types::ExecutionContext::new(
        "s8".to_string(),
        Mode::Direct,
        workflow_forge::workflow::direct_workflow(),
        serde_json::Map::new(),
    );
    ctx.status = ProjectStatus::Running;
    ctx.completed_phases.push("input".to_string());
    store.save(&ctx).await.unwrap();

    let recovered = engine.recover_interrupted().await.unwrap();
    assert_eq!(recovered, vec!["s8".to_string()]);

    let progress = engine.get_progress("s8").await.unwrap();
    assert_eq!(progress.status, ProjectStatus::AwaitingApproval);
}
