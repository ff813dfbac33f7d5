use thiserror::Error;

/// Errors from gate configuration and evaluation.
///
/// Everything except `Evaluation` is raised while building a pipeline, never
/// while an operation is being evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("unknown gate: {0}")]
    UnknownGate(String),

    #[error("gate already registered: {0}")]
    DuplicateGate(String),

    #[error("invalid policy {policy_id} for gate {gate}: {reason}")]
    InvalidPolicy {
        gate: String,
        policy_id: String,
        reason: String,
    },

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("gate {gate} failed to evaluate: {reason}")]
    Evaluation { gate: String, reason: String },
}

impl GateError {
    /// Configuration-time error (as opposed to an evaluation failure).
    pub fn is_configuration(&self) -> bool {
        !matches!(self, GateError::Evaluation { .. })
    }
}
