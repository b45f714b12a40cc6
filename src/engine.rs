//! Orchestration Engine (C9): the state machine tying every other
//! component together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentRunner;
use crate::approval::ApprovalHandle;
use crate::config::WorkflowForgeConfig;
use crate::domain;
use crate::error::{Result, WorkflowForgeError};
use crate::log_warn;
use crate::phase_executor;
use crate::registry::AgentRegistry;
use crate::state::StateStore;
use crate::types::{ExecutionContext, Mode, ProjectStatus};
use crate::workflow::workflow_for_mode;

struct RunningProject {
    #[allow(dead_code)]
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Read-only projection over an `ExecutionContext`, safe to hand to an
/// external caller without exposing the full workflow definition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Progress {
    pub project_id: String,
    pub status: ProjectStatus,
    pub current_phase: Option<String>,
    pub completed_phases: Vec<String>,
    pub total_phases: usize,
    pub activated_experts: Vec<(String, f64)>,
    pub error: Option<String>,
}

impl From<&ExecutionContext> for Progress {
    fn from(ctx: &ExecutionContext) -> Self {
        Self {
            project_id: ctx.project_id.clone(),
            status: ctx.status,
            current_phase: ctx.current_phase.clone(),
            completed_phases: ctx.completed_phases.clone(),
            total_phases: ctx.workflow.phases.len(),
            activated_experts: ctx.activated_experts.clone(),
            error: ctx.error.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn StateStore>,
    approvals: ApprovalHandle,
    config: WorkflowForgeConfig,
    running: Arc<Mutex<HashMap<String, RunningProject>>>,
}

impl Engine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        store: Arc<dyn StateStore>,
        approvals: ApprovalHandle,
        config: WorkflowForgeConfig,
    ) -> Self {
        Self {
            registry,
            store,
            approvals,
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn runner(&self) -> AgentRunner {
        AgentRunner::new(
            std::time::Duration::from_secs(self.config.execution.default_timeout_secs),
            self.config.execution.max_retries,
            std::time::Duration::from_secs(self.config.execution.backoff_base_secs),
        )
    }

    /// Instantiates a fresh project, checkpoints it, and spawns the phase
    /// loop as an independent task. Returns immediately — does not wait for
    /// any phase to finish.
    pub async fn start_workflow(&self, project_id: &str, mode: Mode, input_data: Map<String, Value>) -> Result<ExecutionContext> {
        let workflow = workflow_for_mode(mode);

        let mut context = ExecutionContext::new(project_id.to_string(), mode, workflow, input_data);
        context.status = ProjectStatus::Running;

        if mode == Mode::Discovery {
            let overview = context.input_data.get("project_overview").and_then(|v| v.as_str()).unwrap_or_default();
            let features = context.input_data.get("key_features").and_then(|v| v.as_str()).unwrap_or_default();
            let constraints = context.input_data.get("constraints").and_then(|v| v.as_str()).unwrap_or_default();
            context.activated_experts = domain::detect_domains(overview, features, constraints, &self.config.domain);
        }

        self.store.save(&context).await?;
        self.spawn_phase_loop(context.clone()).await;
        Ok(context)
    }

    /// Reloads a persisted context and continues the phase loop, skipping
    /// every phase already in `completed_phases`. The Engine does not
    /// verify that a pending approval gate has actually been resolved —
    /// that precondition is the external caller's responsibility.
    ///
    /// A no-op on a project already in a terminal state (`Completed`,
    /// `Failed`, `Cancelled`): spawns no work and leaves the stored context
    /// untouched, so resuming twice never overwrites `completed_at`.
    pub async fn resume_workflow(&self, project_id: &str) -> Result<()> {
        let context = self
            .store
            .load(project_id)
            .await?
            .ok_or_else(|| WorkflowForgeError::NotFound(project_id.to_string()))?;

        if matches!(
            context.status,
            ProjectStatus::Completed | ProjectStatus::Failed | ProjectStatus::Cancelled
        ) {
            return Ok(());
        }

        self.spawn_phase_loop(context).await;
        Ok(())
    }

    /// Requests cancellation. Takes effect at the next phase-loop
    /// observation point; an in-flight agent attempt is allowed to finish.
    pub async fn cancel_project(&self, project_id: &str) {
        if let Some(running) = self.running.lock().await.get(project_id) {
            running.cancel.cancel();
        }
    }

    /// Requests cancellation of every project with an active phase-loop
    /// task, for graceful shutdown on SIGINT/SIGTERM.
    pub async fn cancel_all(&self) {
        for running in self.running.lock().await.values() {
            running.cancel.cancel();
        }
    }

    pub async fn get_progress(&self, project_id: &str) -> Result<Progress> {
        let context = self
            .store
            .load(project_id)
            .await?
            .ok_or_else(|| WorkflowForgeError::NotFound(project_id.to_string()))?;
        Ok(Progress::from(&context))
    }

    /// Enumerates every context left `running` (crashed mid-phase-loop) and
    /// rolls each back to a safe resumption point. Never re-executes a
    /// phase automatically.
    pub async fn recover_interrupted(&self) -> Result<Vec<String>> {
        let interrupted = self.store.list_by_status(ProjectStatus::Running).await?;
        let mut recovered = Vec::new();
        for mut context in interrupted {
            rollback_to_safe_point(&mut context);
            self.store.save(&context).await?;
            recovered.push(context.project_id.clone());
        }
        Ok(recovered)
    }

    async fn spawn_phase_loop(&self, context: ExecutionContext) {
        let project_id = context.project_id.clone();
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();

        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let approvals = self.approvals.clone();
        let runner = self.runner();
        let running = Arc::clone(&self.running);
        let project_id_for_task = project_id.clone();

        let handle = tokio::spawn(async move {
            run_phase_loop(context, registry, store, approvals, runner, cancel_for_task).await;
            running.lock().await.remove(&project_id_for_task);
        });

        self.running.lock().await.insert(project_id, RunningProject { handle, cancel });
    }
}

async fn run_phase_loop(
    mut context: ExecutionContext,
    registry: Arc<AgentRegistry>,
    store: Arc<dyn StateStore>,
    approvals: ApprovalHandle,
    runner: AgentRunner,
    cancel: CancellationToken,
) {
    let phases = context.workflow.phases.clone();

    for phase in &phases {
        if context.completed_phases.iter().any(|p| p == &phase.name) {
            continue;
        }

        if cancel.is_cancelled() {
            context.status = ProjectStatus::Cancelled;
            checkpoint(&store, &context).await;
            return;
        }

        context.current_phase = Some(phase.name.clone());
        checkpoint(&store, &context).await;

        let result = match phase_executor::execute_phase(phase, &context, &registry, &runner).await {
            Ok(result) => result,
            Err(e) => {
                context.status = ProjectStatus::Failed;
                context.error = Some(e.to_string());
                checkpoint(&store, &context).await;
                return;
            }
        };

        context.phase_results.insert(phase.name.clone(), result.clone());
        context.completed_phases.push(phase.name.clone());
        checkpoint(&store, &context).await;

        if phase.requires_approval {
            if let Err(e) = approvals.create_gate(&context.project_id, &phase.name, result).await {
                log_warn!("failed to create approval gate for {}/{}: {}", context.project_id, phase.name, e);
            }
            context.status = ProjectStatus::AwaitingApproval;
            checkpoint(&store, &context).await;
            return;
        }
    }

    context.status = ProjectStatus::Completed;
    context.completed_at = Some(Utc::now());
    checkpoint(&store, &context).await;
}

async fn checkpoint(store: &Arc<dyn StateStore>, context: &ExecutionContext) {
    if let Err(e) = store.save(context).await {
        log_warn!("checkpoint failed for project {}: {}", context.project_id, e);
    }
}

/// Pure rollback logic for a context found `running` at startup.
///
/// With no completed phases, there is no generated artifact yet — reset to
/// the initial, unstarted state so a fresh `start_workflow` can run again.
/// Otherwise, the most recently completed phase is the latest artifact;
/// re-enter `awaiting_approval` there regardless of whether that phase
/// itself required approval, since recovery never re-executes a phase and
/// this is the only state from which a caller can deliberately decide
/// whether to resume or restart.
fn rollback_to_safe_point(context: &mut ExecutionContext) {
    if context.completed_phases.is_empty() {
        context.status = ProjectStatus::Pending;
        context.current_phase = None;
        context.phase_results.clear();
        return;
    }

    context.status = ProjectStatus::AwaitingApproval;
    context.current_phase = context.completed_phases.last().cloned();
}
