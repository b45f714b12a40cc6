//! Approval Manager (C8): actor owning the pending-gate table.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use crate::log_warn;
use crate::types::{ApprovalGate, GateStatus, PhaseResult};

const CHANNEL_CAPACITY: usize = 64;

pub enum ApprovalCommand {
    CreateGate {
        project_id: String,
        phase: String,
        artifact: PhaseResult,
        reply: oneshot::Sender<Result<ApprovalGate, String>>,
    },
    Approve {
        gate_id: String,
        reply: oneshot::Sender<Result<ApprovalGate, String>>,
    },
    Reject {
        gate_id: String,
        feedback: String,
        reply: oneshot::Sender<Result<ApprovalGate, String>>,
    },
    FindPendingForProject {
        project_id: String,
        reply: oneshot::Sender<Option<ApprovalGate>>,
    },
    GetGate {
        gate_id: String,
        reply: oneshot::Sender<Option<ApprovalGate>>,
    },
    ListPending {
        reply: oneshot::Sender<Vec<ApprovalGate>>,
    },
}

#[derive(Clone)]
pub struct ApprovalHandle {
    sender: mpsc::Sender<ApprovalCommand>,
}

impl ApprovalHandle {
    async fn send_command<T>(&self, command: ApprovalCommand, rx: oneshot::Receiver<T>) -> Result<T, String> {
        self.sender.send(command).await.map_err(|_| "approval manager shut down".to_string())?;
        rx.await.map_err(|_| "approval manager dropped reply".to_string())
    }

    /// Fails if a pending gate already exists for `project_id` — a project
    /// boundary has at most one open gate at a time.
    pub async fn create_gate(&self, project_id: &str, phase: &str, artifact: PhaseResult) -> Result<ApprovalGate, String> {
        let (reply, rx) = oneshot::channel();
        self.send_command(
            ApprovalCommand::CreateGate {
                project_id: project_id.to_string(),
                phase: phase.to_string(),
                artifact,
                reply,
            },
            rx,
        )
        .await?
    }

    /// Approves the gate. The caller (Engine) is responsible for deciding
    /// what happens next to the workflow.
    pub async fn approve(&self, gate_id: &str) -> Result<ApprovalGate, String> {
        let (reply, rx) = oneshot::channel();
        self.send_command(
            ApprovalCommand::Approve {
                gate_id: gate_id.to_string(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Rejects the gate with feedback. Minimum feedback length is the
    /// caller's concern, not this manager's — the Engine validates before
    /// sending the command.
    pub async fn reject(&self, gate_id: &str, feedback: &str) -> Result<ApprovalGate, String> {
        let (reply, rx) = oneshot::channel();
        self.send_command(
            ApprovalCommand::Reject {
                gate_id: gate_id.to_string(),
                feedback: feedback.to_string(),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn find_pending_for_project(&self, project_id: &str) -> Option<ApprovalGate> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ApprovalCommand::FindPendingForProject {
                project_id: project_id.to_string(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn get_gate(&self, gate_id: &str) -> Option<ApprovalGate> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ApprovalCommand::GetGate {
                gate_id: gate_id.to_string(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn list_pending(&self) -> Vec<ApprovalGate> {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(ApprovalCommand::ListPending { reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

struct ApprovalState {
    /// All gates ever created, keyed by gate id. Resolved gates are kept
    /// (archived), never deleted, so `get_gate` works after the fact.
    gates: HashMap<String, ApprovalGate>,
}

async fn run_approval_manager(mut rx: mpsc::Receiver<ApprovalCommand>) {
    let mut state = ApprovalState { gates: HashMap::new() };

    while let Some(cmd) = rx.recv().await {
        match cmd {
            ApprovalCommand::CreateGate {
                project_id,
                phase,
                artifact,
                reply,
            } => {
                let already_pending = state
                    .gates
                    .values()
                    .any(|g| g.project_id == project_id && g.status == GateStatus::Pending);

                let result = if already_pending {
                    Err(format!("a pending approval gate already exists for project {}", project_id))
                } else {
                    let gate = ApprovalGate {
                        gate_id: uuid::Uuid::new_v4().to_string(),
                        project_id,
                        phase,
                        artifact,
                        status: GateStatus::Pending,
                        feedback: None,
                        created_at: Utc::now(),
                        resolved_at: None,
                    };
                    state.gates.insert(gate.gate_id.clone(), gate.clone());
                    Ok(gate)
                };
                let _ = reply.send(result);
            }
            ApprovalCommand::Approve { gate_id, reply } => {
                let result = resolve_gate(&mut state, &gate_id, GateStatus::Approved, None);
                let _ = reply.send(result);
            }
            ApprovalCommand::Reject { gate_id, feedback, reply } => {
                let result = resolve_gate(&mut state, &gate_id, GateStatus::Rejected, Some(feedback));
                let _ = reply.send(result);
            }
            ApprovalCommand::FindPendingForProject { project_id, reply } => {
                let found = state
                    .gates
                    .values()
                    .find(|g| g.project_id == project_id && g.status == GateStatus::Pending)
                    .cloned();
                let _ = reply.send(found);
            }
            ApprovalCommand::GetGate { gate_id, reply } => {
                let _ = reply.send(state.gates.get(&gate_id).cloned());
            }
            ApprovalCommand::ListPending { reply } => {
                let pending: Vec<ApprovalGate> =
                    state.gates.values().filter(|g| g.status == GateStatus::Pending).cloned().collect();
                let _ = reply.send(pending);
            }
        }
    }
    log_warn!("approval manager shutting down: all handles dropped");
}

fn resolve_gate(
    state: &mut ApprovalState,
    gate_id: &str,
    status: GateStatus,
    feedback: Option<String>,
) -> Result<ApprovalGate, String> {
    let gate = state.gates.get_mut(gate_id).ok_or_else(|| format!("gate not found: {}", gate_id))?;
    if gate.status != GateStatus::Pending {
        return Err(format!("gate {} is not pending (status already resolved)", gate_id));
    }
    gate.status = status;
    gate.feedback = feedback;
    gate.resolved_at = Some(Utc::now());
    Ok(gate.clone())
}

pub fn spawn_approval_manager() -> (ApprovalHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task_handle = tokio::spawn(run_approval_manager(rx));
    (ApprovalHandle { sender: tx }, task_handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_artifact() -> PhaseResult {
        PhaseResult::from_agent_results(BTreeMap::new())
    }

    #[tokio::test]
    async fn create_then_approve_round_trip() {
        let (handle, _task) = spawn_approval_manager();
        let gate = handle.create_gate("p1", "architecture_design", sample_artifact()).await;
        let gate = gate.unwrap();
        assert_eq!(gate.status, GateStatus::Pending);

        let resolved = handle.approve(&gate.gate_id).await.unwrap();
        assert_eq!(resolved.status, GateStatus::Approved);
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn reject_records_feedback() {
        let (handle, _task) = spawn_approval_manager();
        let gate = handle.create_gate("p1", "product_design", sample_artifact()).await.unwrap();
        let resolved = handle.reject(&gate.gate_id, "needs more detail").await.unwrap();
        assert_eq!(resolved.status, GateStatus::Rejected);
        assert_eq!(resolved.feedback.as_deref(), Some("needs more detail"));
    }

    #[tokio::test]
    async fn resolving_twice_is_an_error() {
        let (handle, _task) = spawn_approval_manager();
        let gate = handle.create_gate("p1", "product_design", sample_artifact()).await.unwrap();
        handle.approve(&gate.gate_id).await.unwrap();
        let second = handle.approve(&gate.gate_id).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn find_pending_for_project_ignores_resolved_gates() {
        let (handle, _task) = spawn_approval_manager();
        let gate = handle.create_gate("p1", "product_design", sample_artifact()).await.unwrap();
        handle.approve(&gate.gate_id).await.unwrap();
        assert!(handle.find_pending_for_project("p1").await.is_none());

        let second = handle.create_gate("p1", "architecture_design", sample_artifact()).await.unwrap();
        let found = handle.find_pending_for_project("p1").await.unwrap();
        assert_eq!(found.gate_id, second.gate_id);
    }

    #[tokio::test]
    async fn unknown_gate_is_not_found() {
        let (handle, _task) = spawn_approval_manager();
        let result = handle.approve("ghost").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_gate_fails_while_one_is_already_pending() {
        let (handle, _task) = spawn_approval_manager();
        handle.create_gate("p1", "product_design", sample_artifact()).await.unwrap();
        let second = handle.create_gate("p1", "architecture_design", sample_artifact()).await;
        assert!(second.is_err());
    }
}
