//! Agent Registry (C1): resolves agent ids to runnable handles.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::Agent;
use crate::log_warn;
use crate::types::{AgentInput, AgentOutput};

/// Metadata parsed from a Markdown agent-definition file's frontmatter.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(skip)]
    pub instructions: String,
}

/// Parses a `---`-delimited frontmatter block followed by a free-form body.
///
/// Malformed input (no closing delimiter, invalid YAML) is an error the
/// caller should log and skip rather than abort startup on.
pub fn parse_agent_definition(content: &str) -> Result<AgentDefinition, String> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return Err("agent definition must start with a '---' frontmatter block".to_string());
    }

    let rest = &trimmed[3..];
    let end = rest.find("---").ok_or_else(|| "agent definition frontmatter is not closed".to_string())?;
    let frontmatter = &rest[..end];
    let body = rest[end + 3..].trim_start().to_string();

    let mut definition: AgentDefinition =
        serde_yaml_ng::from_str(frontmatter).map_err(|e| format!("invalid agent frontmatter: {}", e))?;
    definition.instructions = body;

    Ok(definition)
}

/// Opaque collaborator that executes an `AgentDefinition`'s instructions.
/// The engine treats this as an external dependency (spec §1 Out-of-scope).
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        definition: &AgentDefinition,
        input: &AgentInput,
    ) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + 'static>>;
}

/// Synthesized agent that executes a parsed Markdown definition through an
/// external LLM collaborator.
pub struct LlmAdapterAgent {
    definition: AgentDefinition,
    client: Arc<dyn LlmClient>,
}

impl LlmAdapterAgent {
    pub fn new(definition: AgentDefinition, client: Arc<dyn LlmClient>) -> Self {
        Self { definition, client }
    }
}

impl Agent for LlmAdapterAgent {
    fn id(&self) -> &str {
        &self.definition.name
    }

    fn execute(&self, input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        let fut = self.client.complete(&self.definition, &input);
        Box::pin(fut)
    }
}

/// Read-mostly table of agent definitions and native implementations,
/// loaded eagerly at startup and immutable thereafter.
pub struct AgentRegistry {
    definitions: HashMap<String, AgentDefinition>,
    implementations: HashMap<String, Arc<dyn Agent>>,
    llm_client: Option<Arc<dyn LlmClient>>,
}

impl AgentRegistry {
    pub fn new(llm_client: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            definitions: HashMap::new(),
            implementations: HashMap::new(),
            llm_client,
        }
    }

    /// Registers a native implementation, keyed by `Agent::id()`.
    pub fn register_implementation(&mut self, agent: Arc<dyn Agent>) {
        self.implementations.insert(agent.id().to_string(), agent);
    }

    /// Loads agent definitions from a directory of `.md` files. Malformed
    /// files are logged via `log_warn!` and skipped; loading never aborts.
    pub fn load_definitions_from_dir(&mut self, dir: &std::path::Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log_warn!("failed to read agent definitions dir {}: {}", dir.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    log_warn!("failed to read agent definition {}: {}", path.display(), e);
                    continue;
                }
            };
            match parse_agent_definition(&contents) {
                Ok(definition) => {
                    self.definitions.insert(definition.name.clone(), definition);
                }
                Err(e) => {
                    log_warn!("skipping malformed agent definition {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Resolves `agent_id` to a runnable agent: a native implementation if
    /// registered, otherwise an LLM-adapter synthesized from a parsed
    /// definition. Returns `None` if neither is available.
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        if let Some(agent) = self.implementations.get(agent_id) {
            return Some(Arc::clone(agent));
        }
        let definition = self.definitions.get(agent_id)?;
        let client = self.llm_client.as_ref()?;
        Some(Arc::new(LlmAdapterAgent::new(definition.clone(), Arc::clone(client))) as Arc<dyn Agent>)
    }
}
