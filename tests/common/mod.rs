#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use workflow_forge::agent::{arc_agent, Agent, AgentRunner, InputValidatorAgent, SummaryReporterAgent};
use workflow_forge::approval::{spawn_approval_manager, ApprovalHandle};
use workflow_forge::config::WorkflowForgeConfig;
use workflow_forge::engine::Engine;
use workflow_forge::registry::{AgentDefinition, AgentRegistry, LlmClient};
use workflow_forge::state::InMemoryStateStore;
use workflow_forge::types::{AgentInput, AgentOutput};

/// Builds `input_data` for a submission: `project_type` and `description`
/// always set; `project_overview`/`key_features`/`constraints` set only if
/// provided, since discovery mode reads them and direct mode ignores them.
pub fn make_input(project_type: &str, description: &str, overview: Option<&str>) -> Map<String, Value> {
    let mut input = Map::new();
    input.insert("project_type".to_string(), Value::String(project_type.to_string()));
    input.insert("description".to_string(), Value::String(description.to_string()));
    if let Some(overview) = overview {
        input.insert("project_overview".to_string(), Value::String(overview.to_string()));
        input.insert("key_features".to_string(), Value::String(String::new()));
        input.insert("constraints".to_string(), Value::String(String::new()));
    }
    input
}

/// An `Agent` that always succeeds immediately, for phases where only the
/// activation/dispatch/checkpoint plumbing is under test.
pub struct AlwaysSucceedsAgent {
    id: String,
}

impl AlwaysSucceedsAgent {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl Agent for AlwaysSucceedsAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, _input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        Box::pin(async move { AgentOutput::success(Map::new()) })
    }
}

/// An `Agent` that sleeps past any reasonable timeout, for S5-style tests.
pub struct SleepyAgent {
    id: String,
    sleep: std::time::Duration,
}

impl SleepyAgent {
    pub fn new(id: &str, sleep: std::time::Duration) -> Self {
        Self { id: id.to_string(), sleep }
    }
}

impl Agent for SleepyAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, _input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        let sleep = self.sleep;
        Box::pin(async move {
            tokio::time::sleep(sleep).await;
            AgentOutput::success(Map::new())
        })
    }
}

/// A deterministic `LlmClient` test double that echoes the agent name back
/// as its output, for exercising the registry's LLM-adapter path without a
/// real external collaborator.
pub struct EchoLlmClient;

impl LlmClient for EchoLlmClient {
    fn complete(
        &self,
        definition: &AgentDefinition,
        _input: &AgentInput,
    ) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + 'static>> {
        let mut output = Map::new();
        output.insert("agent".to_string(), Value::String(definition.name.clone()));
        Box::pin(async move { AgentOutput::success(output) })
    }
}

/// Builds a registry with the two built-in native agents plus every
/// `extra` agent registered under its own id, backed by the in-memory
/// state store and approval manager — enough to drive a full workflow
/// through the engine in tests.
pub fn make_test_engine(extra: Vec<Arc<dyn Agent>>) -> (Engine, Arc<InMemoryStateStore>, ApprovalHandle) {
    let mut registry = AgentRegistry::new(Some(Arc::new(EchoLlmClient)));
    registry.register_implementation(arc_agent(InputValidatorAgent));
    registry.register_implementation(arc_agent(SummaryReporterAgent));
    for agent in extra {
        registry.register_implementation(agent);
    }

    let store = Arc::new(InMemoryStateStore::new());
    let (approvals, _task) = spawn_approval_manager();

    let mut config = WorkflowForgeConfig::default();
    config.execution.default_timeout_secs = 2;
    config.execution.backoff_base_secs = 0;

    let engine = Engine::new(Arc::new(registry), store.clone(), approvals.clone(), config);
    (engine, store, approvals)
}

pub fn fast_runner() -> AgentRunner {
    AgentRunner::new(std::time::Duration::from_millis(200), 1, std::time::Duration::from_millis(1))
}
