//! Phase Executor (C5): activation filtering + dispatch by execution model.

use std::collections::BTreeMap;

use crate::agent::AgentRunner;
use crate::dependency;
use crate::error::{Result, WorkflowForgeError};
use crate::parallel;
use crate::registry::AgentRegistry;
use crate::types::{AgentInput, AgentOutput, ExecutionContext, ExecutionModel, Phase, PhaseResult};
use crate::workflow::{filter_by_activation_matrix, scaffolding_dependencies};

/// Executes `phase` against `context`. Never returns an error for an
/// agent-level failure — only for structural problems (unknown execution
/// model, dependency cycle).
pub async fn execute_phase(
    phase: &Phase,
    context: &ExecutionContext,
    registry: &AgentRegistry,
    runner: &AgentRunner,
) -> Result<PhaseResult> {
    let agents = activated_agents(phase, context);

    if agents.is_empty() {
        return Ok(PhaseResult::skipped("no_activated_agents"));
    }

    match phase.execution_model {
        ExecutionModel::Sequential => Ok(execute_sequential(&agents, context, registry, runner).await),
        ExecutionModel::Parallel => {
            let input = base_input(context);
            Ok(parallel::execute_parallel(&agents, registry, &input, runner).await)
        }
        ExecutionModel::DependencyGraph => execute_dependency_graph(&agents, context, registry, runner).await,
    }
}

fn activated_agents(phase: &Phase, context: &ExecutionContext) -> Vec<String> {
    match &phase.activation_rules {
        Some(rules) if rules.use_activation_matrix => {
            let project_type = context.project_type();
            filter_by_activation_matrix(&phase.agents, &project_type, &phase.name)
        }
        _ => phase.agents.clone(),
    }
}

fn base_input(context: &ExecutionContext) -> AgentInput {
    AgentInput {
        project_id: context.project_id.clone(),
        context: context.input_data.clone(),
        dependencies: BTreeMap::new(),
    }
}

async fn execute_sequential(
    agents: &[String],
    context: &ExecutionContext,
    registry: &AgentRegistry,
    runner: &AgentRunner,
) -> PhaseResult {
    let mut seen: BTreeMap<String, AgentOutput> = BTreeMap::new();

    for agent_id in agents {
        let Some(agent) = registry.get(agent_id) else {
            continue;
        };

        let input = AgentInput {
            project_id: context.project_id.clone(),
            context: context.input_data.clone(),
            dependencies: seen.clone(),
        };

        let output = runner.run(agent.as_ref(), input).await;
        seen.insert(agent_id.clone(), output);
    }

    PhaseResult::from_agent_results(seen)
}

async fn execute_dependency_graph(
    agents: &[String],
    context: &ExecutionContext,
    registry: &AgentRegistry,
    runner: &AgentRunner,
) -> Result<PhaseResult> {
    let dependencies: std::collections::HashMap<String, Vec<String>> = scaffolding_dependencies()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(|s| s.to_string()).collect()))
        .collect();

    let batches = dependency::resolve(agents, &dependencies).map_err(|e| match e {
        WorkflowForgeError::Cycle(ids) => WorkflowForgeError::Cycle(ids),
        other => other,
    })?;

    let mut accumulated: BTreeMap<String, AgentOutput> = BTreeMap::new();

    for batch in batches {
        let input = AgentInput {
            project_id: context.project_id.clone(),
            context: context.input_data.clone(),
            dependencies: accumulated.clone(),
        };
        let batch_result = parallel::execute_parallel(&batch, registry, &input, runner).await;
        accumulated.extend(batch_result.agent_results);
    }

    Ok(PhaseResult::from_agent_results(accumulated))
}
