use std::time::Duration;

/// Error taxonomy for the orchestration engine.
///
/// Categories (see spec §7):
/// - Retryable: transient, worth another attempt inside the Agent Runner
/// - Fatal to a phase: aborts the phase loop and fails the workflow
/// - Absorbed: captured into a result object, never propagated as an error
#[derive(Debug, thiserror::Error)]
pub enum WorkflowForgeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("project not found: {0}")]
    NotFound(String),

    #[error("dependency cycle detected among: {0:?}")]
    Cycle(Vec<String>),

    #[error("agent {agent_id} timed out after {elapsed:?}")]
    Timeout { agent_id: String, elapsed: Duration },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowForgeError {
    /// True if the Agent Runner should retry on this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowForgeError::Timeout { .. })
    }

    /// True if the error is structural and must fail the whole workflow
    /// rather than being absorbed into a phase result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowForgeError::Cycle(_) | WorkflowForgeError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkflowForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_not_fatal() {
        let e = WorkflowForgeError::Timeout {
            agent_id: "a".to_string(),
            elapsed: Duration::from_secs(1),
        };
        assert!(e.is_retryable());
        assert!(!e.is_fatal());
    }

    #[test]
    fn cycle_is_fatal_not_retryable() {
        let e = WorkflowForgeError::Cycle(vec!["a".to_string()]);
        assert!(e.is_fatal());
        assert!(!e.is_retryable());
    }
}
