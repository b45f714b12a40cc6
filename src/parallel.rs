//! Parallel Executor (C4): runs a set of agents concurrently, tolerating
//! partial failure.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::agent::{Agent, AgentRunner};
use crate::registry::AgentRegistry;
use crate::types::{AgentInput, AgentOutput, PhaseResult};

/// Runs every resolvable id in `agent_ids` concurrently via `registry`,
/// waits for all to settle, and aggregates into a `PhaseResult`.
///
/// Unresolved ids are silently dropped — the Phase Executor is responsible
/// for activation filtering upstream. No peer is cancelled when another
/// fails or times out.
pub async fn execute_parallel(
    agent_ids: &[String],
    registry: &AgentRegistry,
    input: &AgentInput,
    runner: &AgentRunner,
) -> PhaseResult {
    let mut set: JoinSet<(String, AgentOutput)> = JoinSet::new();

    for agent_id in agent_ids {
        let Some(agent) = registry.get(agent_id) else {
            continue;
        };
        let agent_id = agent_id.clone();
        let input = input.clone();
        let timeout = runner.timeout;
        let max_retries = runner.max_retries;
        let backoff_base = runner.backoff_base;

        set.spawn(async move {
            let local_runner = AgentRunner::new(timeout, max_retries, backoff_base);
            let output = local_runner.run(agent.as_ref(), input).await;
            (agent_id, output)
        });
    }

    let mut agent_results: BTreeMap<String, AgentOutput> = BTreeMap::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((agent_id, output)) => {
                agent_results.insert(agent_id, output);
            }
            Err(join_err) => {
                // A panicking agent task is treated the same as a failed
                // attempt — it never escapes the phase.
                agent_results.insert(
                    format!("<panicked task {}>", join_err.id()),
                    AgentOutput::failure(vec![format!("agent task panicked: {}", join_err)]),
                );
            }
        }
    }

    PhaseResult::from_agent_results(agent_results)
}

/// Runs `agent` once, under `timeout`, without the retry loop — used for
/// tests that need direct control over a single agent's per-call deadline
/// (spec S5: a slow agent's slot must fail without affecting siblings).
pub async fn run_with_timeout(agent: Arc<dyn Agent>, input: AgentInput, timeout: Duration) -> AgentOutput {
    match tokio::time::timeout(timeout, agent.execute(input)).await {
        Ok(output) => output,
        Err(_) => AgentOutput::failure(vec![format!("agent {} timed out after {:?}", agent.id(), timeout)]),
    }
}
