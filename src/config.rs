use std::path::Path;

use serde::Deserialize;

#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WorkflowForgeConfig {
    pub execution: ExecutionConfig,
    pub domain: DomainConfig,
    pub approval: ApprovalConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub default_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub max_concurrent_agents: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 300,
            max_retries: 3,
            backoff_base_secs: 1,
            max_concurrent_agents: 8,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DomainConfig {
    pub confidence_threshold: f64,
    pub max_experts: usize,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            max_experts: 3,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ApprovalConfig {
    pub min_rejection_feedback_len: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            min_rejection_feedback_len: 10,
        }
    }
}

pub fn validate(config: &WorkflowForgeConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.execution.default_timeout_secs == 0 {
        errors.push("execution.default_timeout_secs must be >= 1".to_string());
    }

    if config.execution.max_concurrent_agents < 1 {
        errors.push("execution.max_concurrent_agents must be >= 1".to_string());
    }

    if !(0.0..=1.0).contains(&config.domain.confidence_threshold) {
        errors.push("domain.confidence_threshold must be within [0.0, 1.0]".to_string());
    }

    if config.domain.max_experts == 0 {
        errors.push("domain.max_experts must be >= 1".to_string());
    }

    if config.approval.min_rejection_feedback_len == 0 {
        errors.push("approval.min_rejection_feedback_len must be >= 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Load config from an explicit path (if provided) or fall back to `{project_root}/workflow-forge.toml`.
///
/// When `config_path` is `Some`, the file MUST exist — returns an error if missing.
/// When `config_path` is `None`, delegates to `load_config` (returns defaults if missing).
pub fn load_config_from(
    config_path: Option<&Path>,
    project_root: &Path,
) -> Result<WorkflowForgeConfig, String> {
    match config_path {
        Some(path) => load_config_at(path),
        None => load_config(project_root),
    }
}

fn load_config_at(path: &Path) -> Result<WorkflowForgeConfig, String> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let config: WorkflowForgeConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
        )
    })?;

    Ok(config)
}

pub fn load_config(project_root: &Path) -> Result<WorkflowForgeConfig, String> {
    let config_path = project_root.join("workflow-forge.toml");

    if !config_path.exists() {
        return Ok(WorkflowForgeConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;

    let config: WorkflowForgeConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
        )
    })?;

    Ok(config)
}
