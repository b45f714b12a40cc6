//! Built-in workflow definitions, activation matrix, and the scaffolding
//! dependency graph (spec §6).

use std::collections::HashMap;

use crate::types::{ActivationRules, ExecutionModel, Mode, Phase, WorkflowDefinition};

pub fn discovery_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "AI Discovery Workflow".to_string(),
        mode: Mode::Discovery,
        phases: vec![
            Phase {
                name: "input".to_string(),
                display_name: "Input".to_string(),
                description: "Receive and validate project overview".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Sequential,
                agents: vec!["input_validator".to_string()],
                activation_rules: None,
            },
            Phase {
                name: "product_design".to_string(),
                display_name: "Product Design".to_string(),
                description: "Generate product design from overview".to_string(),
                requires_approval: true,
                execution_model: ExecutionModel::Sequential,
                agents: vec!["po_agent".to_string()],
                activation_rules: None,
            },
            Phase {
                name: "requirements".to_string(),
                display_name: "Requirements".to_string(),
                description: "Generate detailed requirements, epics, and user stories".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Parallel,
                agents: vec!["requirement_agent".to_string()],
                activation_rules: None,
            },
            Phase {
                name: "architecture_design".to_string(),
                display_name: "Architecture Design".to_string(),
                description: "Design system architecture".to_string(),
                requires_approval: true,
                execution_model: ExecutionModel::Parallel,
                agents: vec![
                    "fullstack_architect".to_string(),
                    "backend_architect".to_string(),
                    "frontend_architect".to_string(),
                    "database_architect".to_string(),
                    "infrastructure_architect".to_string(),
                    "security_architect".to_string(),
                    "ml_architect".to_string(),
                    "ai_architect".to_string(),
                ],
                activation_rules: Some(ActivationRules {
                    use_activation_matrix: true,
                }),
            },
            Phase {
                name: "code_generation".to_string(),
                display_name: "Code Generation".to_string(),
                description: "Generate code from architecture".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Parallel,
                agents: vec![
                    "fullstack_developer".to_string(),
                    "backend_developer".to_string(),
                    "frontend_developer".to_string(),
                    "aiml_developer".to_string(),
                ],
                activation_rules: Some(ActivationRules {
                    use_activation_matrix: true,
                }),
            },
            Phase {
                name: "quality".to_string(),
                display_name: "Quality & DevOps".to_string(),
                description: "Generate tests, CI/CD, and documentation".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Parallel,
                agents: vec![
                    "testing_agent".to_string(),
                    "cicd_agent".to_string(),
                    "documentation_agent".to_string(),
                ],
                activation_rules: None,
            },
            Phase {
                name: "scaffolding".to_string(),
                display_name: "Scaffolding".to_string(),
                description: "Create project files and setup integrations".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::DependencyGraph,
                agents: vec![
                    "filesystem_scaffolder".to_string(),
                    "git_provisioner".to_string(),
                    "workflow_generator".to_string(),
                    "jira_provisioner".to_string(),
                ],
                activation_rules: None,
            },
            Phase {
                name: "summary".to_string(),
                display_name: "Summary".to_string(),
                description: "Generate final summary and next steps".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Sequential,
                agents: vec!["summary_reporter".to_string()],
                activation_rules: None,
            },
        ],
    }
}

pub fn direct_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "Direct Scaffolding Workflow".to_string(),
        mode: Mode::Direct,
        phases: vec![
            Phase {
                name: "input".to_string(),
                display_name: "Input".to_string(),
                description: "Receive and validate project specification".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Sequential,
                agents: vec!["spec_validator".to_string()],
                activation_rules: None,
            },
            Phase {
                name: "architecture_design".to_string(),
                display_name: "Architecture".to_string(),
                description: "Quick architecture setup".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Parallel,
                agents: vec![
                    "fullstack_architect".to_string(),
                    "backend_architect".to_string(),
                    "frontend_architect".to_string(),
                    "database_architect".to_string(),
                    "infrastructure_architect".to_string(),
                    "security_architect".to_string(),
                    "ml_architect".to_string(),
                    "ai_architect".to_string(),
                ],
                activation_rules: Some(ActivationRules {
                    use_activation_matrix: true,
                }),
            },
            Phase {
                name: "scaffolding".to_string(),
                display_name: "Scaffolding".to_string(),
                description: "Create project files and setup integrations".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::DependencyGraph,
                agents: vec![
                    "filesystem_scaffolder".to_string(),
                    "git_provisioner".to_string(),
                    "workflow_generator".to_string(),
                    "jira_provisioner".to_string(),
                ],
                activation_rules: None,
            },
            Phase {
                name: "summary".to_string(),
                display_name: "Summary".to_string(),
                description: "Generate final summary".to_string(),
                requires_approval: false,
                execution_model: ExecutionModel::Sequential,
                agents: vec!["summary_reporter".to_string()],
                activation_rules: None,
            },
        ],
    }
}

pub fn workflow_for_mode(mode: Mode) -> WorkflowDefinition {
    match mode {
        Mode::Discovery => discovery_workflow(),
        Mode::Direct => direct_workflow(),
    }
}

/// `project_type × phase_name → eligible agent ids`. Unknown project types
/// fall back to `web-app`.
pub fn activation_matrix() -> HashMap<&'static str, HashMap<&'static str, Vec<&'static str>>> {
    let mut matrix = HashMap::new();

    matrix.insert(
        "web-app",
        HashMap::from([
            (
                "architecture_design",
                vec![
                    "fullstack_architect",
                    "backend_architect",
                    "frontend_architect",
                    "database_architect",
                    "infrastructure_architect",
                    "security_architect",
                ],
            ),
            ("code_generation", vec!["fullstack_developer", "backend_developer", "frontend_developer"]),
        ]),
    );

    matrix.insert(
        "api",
        HashMap::from([
            (
                "architecture_design",
                vec!["backend_architect", "database_architect", "infrastructure_architect", "security_architect"],
            ),
            ("code_generation", vec!["backend_developer"]),
        ]),
    );

    matrix.insert(
        "ml-project",
        HashMap::from([
            (
                "architecture_design",
                vec![
                    "fullstack_architect",
                    "backend_architect",
                    "database_architect",
                    "infrastructure_architect",
                    "ml_architect",
                ],
            ),
            ("code_generation", vec!["backend_developer", "aiml_developer"]),
        ]),
    );

    matrix.insert(
        "ai-app",
        HashMap::from([
            (
                "architecture_design",
                vec![
                    "fullstack_architect",
                    "backend_architect",
                    "frontend_architect",
                    "database_architect",
                    "infrastructure_architect",
                    "security_architect",
                    "ai_architect",
                ],
            ),
            ("code_generation", vec!["fullstack_developer", "aiml_developer"]),
        ]),
    );

    matrix.insert(
        "full-platform",
        HashMap::from([
            (
                "architecture_design",
                vec![
                    "fullstack_architect",
                    "backend_architect",
                    "frontend_architect",
                    "database_architect",
                    "infrastructure_architect",
                    "security_architect",
                    "ml_architect",
                    "ai_architect",
                ],
            ),
            (
                "code_generation",
                vec!["fullstack_developer", "backend_developer", "frontend_developer", "aiml_developer"],
            ),
        ]),
    );

    matrix
}

/// Filters `agents` (a phase's declared eligible set) down to those listed
/// for `project_type`/`phase_name` in the activation matrix, falling back to
/// `web-app` for unrecognized project types.
pub fn filter_by_activation_matrix(agents: &[String], project_type: &str, phase_name: &str) -> Vec<String> {
    let matrix = activation_matrix();
    let by_type = matrix.get(project_type).or_else(|| matrix.get("web-app")).expect("web-app always present");
    let activated = by_type.get(phase_name).cloned().unwrap_or_default();
    agents.iter().filter(|a| activated.contains(&a.as_str())).cloned().collect()
}

/// Static dependency table for the scaffolding phase's `dependency_graph`
/// execution model: `filesystem_scaffolder → git_provisioner → {workflow_generator, jira_provisioner}`.
pub fn scaffolding_dependencies() -> HashMap<&'static str, Vec<&'static str>> {
    HashMap::from([
        ("git_provisioner", vec!["filesystem_scaffolder"]),
        ("workflow_generator", vec!["git_provisioner"]),
        ("jira_provisioner", vec!["git_provisioner"]),
    ])
}
