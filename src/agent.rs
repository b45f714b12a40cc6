use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde_json::Map;

use crate::error::WorkflowForgeError;
use crate::types::{AgentInput, AgentOutput, AgentStatus};
use crate::{log_debug, log_warn};

/// Global shutdown flag shared with signal handlers.
fn shutdown_flag() -> &'static Arc<AtomicBool> {
    static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    FLAG.get_or_init(|| Arc::new(AtomicBool::new(false)))
}

/// Check if a shutdown has been requested via signal. The CLI driver polls
/// this between projects to trigger `Engine::cancel_project` on each running
/// workflow rather than killing the process outright — an in-flight agent
/// attempt is allowed to finish per spec §5's cancellation model.
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Install signal handlers for SIGTERM and SIGINT that set the shutdown flag.
///
/// Call once at program startup. Subsequent calls are safe (re-registers handlers).
pub fn install_signal_handlers() -> Result<(), String> {
    let flag = Arc::clone(shutdown_flag());
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))
        .map_err(|e| format!("Failed to register SIGTERM handler: {}", e))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag)
        .map_err(|e| format!("Failed to register SIGINT handler: {}", e))?;
    Ok(())
}

/// An executable unit of work within a phase.
///
/// Implementations cover both natively-coded agents (`InputValidatorAgent`,
/// `SummaryReporterAgent`, ...) and the LLM-adapter synthesized by the
/// registry from a parsed Markdown agent definition when no native
/// implementation is registered.
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn execute(&self, input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>>;
}

/// Runs an agent with the validation/timing/retry/backoff/timeout contract.
///
/// Mirrors the retry-loop-with-backoff shape: each attempt races the agent's
/// future against a timeout; transient failures are retried with linear
/// backoff up to `max_retries`, the last attempt's output is always returned.
pub struct AgentRunner {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl AgentRunner {
    pub fn new(timeout: Duration, max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff_base,
        }
    }

    /// Execute `agent` against `input`, retrying on timeout or failure.
    ///
    /// Invariant: always returns an `AgentOutput` — never propagates a Rust
    /// error out of this function. A `NeedsInput` result short-circuits the
    /// retry loop immediately since another attempt cannot resolve it, and a
    /// missing `project_id` rejects the input outright without ever calling
    /// the agent.
    pub async fn run(&self, agent: &dyn Agent, input: AgentInput) -> AgentOutput {
        if input.project_id.trim().is_empty() {
            let err = WorkflowForgeError::Validation(format!("agent {}: input.project_id is missing", agent.id()));
            return AgentOutput::failure(vec![err.to_string()]);
        }

        let attempts = self.max_retries.max(1);
        let mut last = AgentOutput::failure(vec!["agent never ran".to_string()]);

        for attempt in 1..=attempts {
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, agent.execute(input.clone())).await;
            let elapsed = started.elapsed();

            last = match outcome {
                Ok(mut output) => {
                    output.duration_ms = elapsed.as_millis() as u64;
                    output
                }
                Err(_) => {
                    let err = WorkflowForgeError::Timeout {
                        agent_id: agent.id().to_string(),
                        elapsed: self.timeout,
                    };
                    log_warn!("{} (attempt {}/{})", err, attempt, attempts);
                    AgentOutput {
                        status: AgentStatus::Failure,
                        output: Map::new(),
                        artifacts: Vec::new(),
                        messages: Vec::new(),
                        errors: vec![err.to_string()],
                        duration_ms: elapsed.as_millis() as u64,
                        token_usage: None,
                    }
                }
            };

            match last.status {
                AgentStatus::Success | AgentStatus::NeedsInput => return last,
                AgentStatus::Failure => {
                    if attempt < attempts {
                        let backoff = self.backoff_base * attempt;
                        log_debug!(
                            "agent {} attempt {}/{} failed, retrying in {:?}",
                            agent.id(),
                            attempt,
                            attempts,
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        last
    }
}

/// Validates that required project input fields are present.
///
/// Grounded in the original's input-validation agent: checks for a
/// non-empty `description` and a recognized `project_type`.
pub struct InputValidatorAgent;

const KNOWN_PROJECT_TYPES: &[&str] = &["web-app", "api", "ml-project", "ai-app", "full-platform"];

impl Agent for InputValidatorAgent {
    fn id(&self) -> &str {
        "input_validator"
    }

    fn execute(&self, input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        Box::pin(async move {
            let mut errors = Vec::new();

            let description = input.context.get("description").and_then(|v| v.as_str());
            if description.map(|s| s.trim().is_empty()).unwrap_or(true) {
                errors.push("input_data.description must be a non-empty string".to_string());
            }

            let project_type = input.context.get("project_type").and_then(|v| v.as_str());
            if let Some(pt) = project_type {
                if !KNOWN_PROJECT_TYPES.contains(&pt) {
                    errors.push(format!("input_data.project_type '{}' is not recognized", pt));
                }
            }

            if errors.is_empty() {
                let mut output = Map::new();
                output.insert("validated".to_string(), serde_json::Value::Bool(true));
                AgentOutput::success(output)
            } else {
                AgentOutput::failure(errors)
            }
        })
    }
}

/// Summarizes the phase results collected so far into a short report.
///
/// Grounded in the original's reporting agent: has no hard dependencies,
/// runs last, and never fails the workflow on its own account.
pub struct SummaryReporterAgent;

impl Agent for SummaryReporterAgent {
    fn id(&self) -> &str {
        "summary_reporter"
    }

    fn execute(&self, input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        Box::pin(async move {
            let completed: Vec<&str> = input
                .dependencies
                .iter()
                .filter(|(_, out)| out.is_success())
                .map(|(id, _)| id.as_str())
                .collect();

            let mut output = Map::new();
            output.insert(
                "summary".to_string(),
                serde_json::Value::String(format!(
                    "{} upstream agent(s) completed successfully: {}",
                    completed.len(),
                    completed.join(", ")
                )),
            );
            AgentOutput::success(output)
        })
    }
}

/// Test double returning a preconfigured sequence of outputs, one per call.
pub struct MockAgent {
    id: String,
    results: tokio::sync::Mutex<Vec<AgentOutput>>,
}

impl MockAgent {
    pub fn new(id: &str, results: Vec<AgentOutput>) -> Self {
        let mut reversed = results;
        reversed.reverse();
        Self {
            id: id.to_string(),
            results: tokio::sync::Mutex::new(reversed),
        }
    }
}

impl Agent for MockAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, _input: AgentInput) -> Pin<Box<dyn Future<Output = AgentOutput> + Send + '_>> {
        Box::pin(async move {
            let mut results = self.results.lock().await;
            results
                .pop()
                .unwrap_or_else(|| AgentOutput::failure(vec!["MockAgent: no more results in sequence".to_string()]))
        })
    }
}

pub fn arc_agent<A: Agent + 'static>(agent: A) -> Arc<dyn Agent> {
    Arc::new(agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_signal_handlers_succeeds() {
        let result = install_signal_handlers();
        assert!(result.is_ok());
    }

    fn runner() -> AgentRunner {
        AgentRunner::new(Duration::from_millis(200), 3, Duration::from_millis(1))
    }

    fn sample_input() -> AgentInput {
        AgentInput {
            project_id: "p1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn input_validator_rejects_missing_description() {
        let agent = InputValidatorAgent;
        let out = agent.execute(AgentInput::default()).await;
        assert_eq!(out.status, AgentStatus::Failure);
    }

    #[tokio::test]
    async fn input_validator_accepts_valid_input() {
        let mut ctx = Map::new();
        ctx.insert("description".to_string(), serde_json::Value::String("a real project".to_string()));
        ctx.insert("project_type".to_string(), serde_json::Value::String("web-app".to_string()));
        let input = AgentInput {
            project_id: "p1".to_string(),
            context: ctx,
            dependencies: Default::default(),
        };
        let out = InputValidatorAgent.execute(input).await;
        assert!(out.is_success());
    }

    #[tokio::test]
    async fn runner_retries_on_failure_then_succeeds() {
        let mock = MockAgent::new(
            "flaky",
            vec![
                AgentOutput::failure(vec!["first try down".to_string()]),
                AgentOutput::success(Map::new()),
            ],
        );
        let out = runner().run(&mock, sample_input()).await;
        assert!(out.is_success());
    }

    #[tokio::test]
    async fn runner_stops_immediately_on_needs_input() {
        let mock = MockAgent::new("blocked", vec![AgentOutput::needs_input(vec!["clarify scope".to_string()])]);
        let out = runner().run(&mock, sample_input()).await;
        assert_eq!(out.status, AgentStatus::NeedsInput);
    }

    #[tokio::test]
    async fn runner_exhausts_retries_and_returns_last_failure() {
        let mock = MockAgent::new(
            "always_down",
            vec![
                AgentOutput::failure(vec!["down".to_string()]),
                AgentOutput::failure(vec!["still down".to_string()]),
                AgentOutput::failure(vec!["down again".to_string()]),
            ],
        );
        let out = runner().run(&mock, sample_input()).await;
        assert_eq!(out.status, AgentStatus::Failure);
    }

    #[tokio::test]
    async fn runner_rejects_input_with_missing_project_id() {
        let mock = MockAgent::new("anything", vec![AgentOutput::success(Map::new())]);
        let out = runner().run(&mock, AgentInput::default()).await;
        assert_eq!(out.status, AgentStatus::Failure);
        assert!(out.errors[0].contains("project_id"));
    }
}
