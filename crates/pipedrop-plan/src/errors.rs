use thiserror::Error;

/// Errors raised while compiling selectors or building a drop plan.
///
/// All of them surface before anything is mutated.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid resource pattern '{selector}': {reason}")]
    InvalidPattern { selector: String, reason: String },
    #[error("invalid state path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("core error: {0}")]
    Core(#[from] pipedrop_core::Error),
}

impl PlanError {
    pub(crate) fn pattern(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for planning operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;
