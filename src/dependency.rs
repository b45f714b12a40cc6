//! Dependency Resolver (C3): Kahn's-algorithm batching with cycle detection.

use std::collections::{HashMap, VecDeque};

use crate::error::{Result, WorkflowForgeError};

/// Orders `agents` into batches such that every id appears in exactly one
/// batch, no id precedes any of its declared predecessors (restricted to
/// `agents`), and ids within a batch are mutually independent.
///
/// Within a batch, ids retain the relative order they had in `agents`
/// (FIFO draining of the ready queue, not a second sort).
pub fn resolve(agents: &[String], dependencies: &HashMap<String, Vec<String>>) -> Result<Vec<Vec<String>>> {
    let agent_set: std::collections::HashSet<&str> = agents.iter().map(|a| a.as_str()).collect();

    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = agents.iter().map(|a| (a.as_str(), 0)).collect();

    for agent in agents {
        if let Some(deps) = dependencies.get(agent) {
            for dep in deps {
                if agent_set.contains(dep.as_str()) {
                    graph.entry(dep.as_str()).or_default().push(agent.as_str());
                    *in_degree.get_mut(agent.as_str()).unwrap() += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<&str> = agents.iter().map(|a| a.as_str()).filter(|a| in_degree[a] == 0).collect();

    let mut batches: Vec<Vec<String>> = Vec::new();
    while !queue.is_empty() {
        let mut batch = Vec::new();
        for _ in 0..queue.len() {
            let agent = queue.pop_front().unwrap();
            batch.push(agent.to_string());
            if let Some(dependents) = graph.get(agent) {
                for &dependent in dependents {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
    }

    let total_sorted: usize = batches.iter().map(|b| b.len()).sum();
    if total_sorted != agents.len() {
        let unresolved: Vec<String> = agents
            .iter()
            .filter(|a| !batches.iter().flatten().any(|b| b == *a))
            .cloned()
            .collect();
        return Err(WorkflowForgeError::Cycle(unresolved));
    }

    Ok(batches)
}
