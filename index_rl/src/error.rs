// Error types for the index selection agent
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Structural misconfiguration: bad settings, zero context vectors,
    /// or vectors whose dimensions disagree with the configured shape.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("replay memory is empty; observe at least one transition before replay")]
    EmptyMemory,

    #[error("action {action} does not map to a known arm ({arms} arms registered)")]
    OutOfRangeAction { action: usize, arms: usize },

    #[error("training step produced a non-finite loss ({0})")]
    NonFiniteLoss(f32),

    #[error("non-finite TD error ({0}); check rewards and network outputs")]
    NonFiniteTdError(f32),

    #[error("priority must be finite and non-negative, got {0}")]
    InvalidPriority(f64),

    #[error("controller used before initialize()")]
    Uninitialized,

    #[error("tensor data error: {0}")]
    Tensor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// True for failures that must halt an experiment rather than be
    /// degraded into an empty selection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AgentError::OutOfRangeAction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_is_recoverable() {
        let err = AgentError::OutOfRangeAction { action: 7, arms: 3 };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("action 7"));
    }

    #[test]
    fn test_non_finite_loss_is_fatal() {
        assert!(AgentError::NonFiniteLoss(f32::NAN).is_fatal());
        assert!(AgentError::EmptyMemory.is_fatal());
        assert!(AgentError::NonFiniteTdError(f32::NAN).is_fatal());
    }
}
