use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Enums ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Discovery,
    Direct,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    Running,
    AwaitingApproval,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    Sequential,
    Parallel,
    DependencyGraph,
}

pub fn parse_execution_model(s: &str) -> Result<ExecutionModel, String> {
    match s {
        "sequential" => Ok(ExecutionModel::Sequential),
        "parallel" => Ok(ExecutionModel::Parallel),
        "dependency_graph" => Ok(ExecutionModel::DependencyGraph),
        _ => Err(format!("unknown execution model: {}", s)),
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Success,
    Failure,
    NeedsInput,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    PartialFailure,
    Skipped,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

// --- Agent invocation I/O, grounded in original_source/src/agents/base.py ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct AgentInput {
    pub project_id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Prior agent outputs keyed by agent id, visible to dependents only.
    #[serde(default)]
    pub dependencies: BTreeMap<String, AgentOutput>,
}

impl AgentInput {
    pub fn get_dependency(&self, agent_id: &str) -> Option<&AgentOutput> {
        self.dependencies.get(agent_id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentOutput {
    pub status: AgentStatus,
    #[serde(default)]
    pub output: Map<String, Value>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl AgentOutput {
    pub fn success(output: Map<String, Value>) -> Self {
        Self {
            status: AgentStatus::Success,
            output,
            artifacts: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
            token_usage: None,
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            status: AgentStatus::Failure,
            output: Map::new(),
            artifacts: Vec::new(),
            messages: Vec::new(),
            errors,
            duration_ms: 0,
            token_usage: None,
        }
    }

    pub fn needs_input(messages: Vec<String>) -> Self {
        Self {
            status: AgentStatus::NeedsInput,
            output: Map::new(),
            artifacts: Vec::new(),
            messages,
            errors: Vec::new(),
            duration_ms: 0,
            token_usage: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }
}

// --- Phase / workflow definition ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ActivationRules {
    #[serde(default)]
    pub use_activation_matrix: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Phase {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub requires_approval: bool,
    pub execution_model: ExecutionModel,
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_rules: Option<ActivationRules>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorkflowDefinition {
    pub name: String,
    pub mode: Mode,
    pub phases: Vec<Phase>,
}

impl WorkflowDefinition {
    pub fn get_phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }
}

// --- Phase execution result ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhaseResult {
    pub status: PhaseStatus,
    #[serde(default)]
    pub agent_results: BTreeMap<String, AgentOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PhaseResult {
    pub fn skipped(reason: &str) -> Self {
        Self {
            status: PhaseStatus::Skipped,
            agent_results: BTreeMap::new(),
            reason: Some(reason.to_string()),
            errors: Vec::new(),
        }
    }

    /// Aggregates a batch of per-agent outcomes the way the parallel
    /// executor's `gather(..., return_exceptions=True)` counterpart does:
    /// any individual failure degrades the phase to partial, never aborts it.
    pub fn from_agent_results(agent_results: BTreeMap<String, AgentOutput>) -> Self {
        let errors: Vec<String> = agent_results
            .iter()
            .filter(|(_, out)| !out.is_success())
            .flat_map(|(id, out)| {
                if out.errors.is_empty() {
                    vec![format!("{}: failed", id)]
                } else {
                    out.errors.iter().map(|e| format!("{}: {}", id, e)).collect()
                }
            })
            .collect();

        let status = if errors.is_empty() {
            PhaseStatus::Completed
        } else {
            PhaseStatus::PartialFailure
        };

        Self {
            status,
            agent_results,
            reason: None,
            errors,
        }
    }
}

// --- Approval gate ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApprovalGate {
    pub gate_id: String,
    pub project_id: String,
    pub phase: String,
    pub artifact: PhaseResult,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// --- Execution context ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExecutionContext {
    pub project_id: String,
    pub mode: Mode,
    pub workflow: WorkflowDefinition,
    #[serde(default)]
    pub input_data: Map<String, Value>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub completed_phases: Vec<String>,
    #[serde(default)]
    pub phase_results: BTreeMap<String, PhaseResult>,
    /// (domain, confidence) pairs, non-empty only when `mode = Discovery`.
    #[serde(default)]
    pub activated_experts: Vec<(String, f64)>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionContext {
    pub fn new(
        project_id: String,
        mode: Mode,
        workflow: WorkflowDefinition,
        input_data: Map<String, Value>,
    ) -> Self {
        Self {
            project_id,
            mode,
            workflow,
            input_data,
            status: ProjectStatus::Pending,
            current_phase: None,
            completed_phases: Vec::new(),
            phase_results: BTreeMap::new(),
            activated_experts: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// `completed_phases` must be a strict prefix of the workflow's phase sequence.
    pub fn is_strict_prefix(&self) -> bool {
        let names: Vec<&str> = self.workflow.phases.iter().map(|p| p.name.as_str()).collect();
        self.completed_phases
            .iter()
            .enumerate()
            .all(|(i, name)| names.get(i).map(|n| *n == name).unwrap_or(false))
    }

    /// Every entry in `phase_results` must have a matching `completed_phases` entry.
    pub fn phase_results_match_completed(&self) -> bool {
        self.phase_results.len() == self.completed_phases.len()
            && self
                .phase_results
                .keys()
                .all(|k| self.completed_phases.iter().any(|c| c == k))
    }

    pub fn project_type(&self) -> String {
        self.input_data
            .get("project_type")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "web-app".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "test".to_string(),
            mode: Mode::Direct,
            phases: vec![
                Phase {
                    name: "input".to_string(),
                    display_name: "Input".to_string(),
                    description: "d".to_string(),
                    requires_approval: false,
                    execution_model: ExecutionModel::Sequential,
                    agents: vec![],
                    activation_rules: None,
                },
                Phase {
                    name: "summary".to_string(),
                    display_name: "Summary".to_string(),
                    description: "d".to_string(),
                    requires_approval: false,
                    execution_model: ExecutionModel::Sequential,
                    agents: vec![],
                    activation_rules: None,
                },
            ],
        }
    }

    #[test]
    fn strict_prefix_holds_for_empty_and_partial() {
        let mut ctx = ExecutionContext::new("p1".to_string(), Mode::Direct, sample_workflow(), Map::new());
        assert!(ctx.is_strict_prefix());
        ctx.completed_phases.push("input".to_string());
        assert!(ctx.is_strict_prefix());
    }

    #[test]
    fn strict_prefix_fails_out_of_order() {
        let mut ctx = ExecutionContext::new("p1".to_string(), Mode::Direct, sample_workflow(), Map::new());
        ctx.completed_phases.push("summary".to_string());
        assert!(!ctx.is_strict_prefix());
    }

    #[test]
    fn project_type_defaults_to_web_app() {
        let ctx = ExecutionContext::new("p1".to_string(), Mode::Direct, sample_workflow(), Map::new());
        assert_eq!(ctx.project_type(), "web-app");
    }

    #[test]
    fn agent_output_constructors_set_status() {
        let s = AgentOutput::success(Map::new());
        assert!(s.is_success());
        let f = AgentOutput::failure(vec!["oops".to_string()]);
        assert!(!f.is_success());
    }

    #[test]
    fn parse_execution_model_rejects_unknown() {
        assert!(parse_execution_model("sequential").is_ok());
        assert!(parse_execution_model("bogus").is_err());
    }
}
