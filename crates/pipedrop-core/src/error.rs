use thiserror::Error;

/// Core error type shared across pipedrop crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A mutation referenced tables the schema does not hold.
    #[error("schema consistency error: {0}")]
    SchemaConsistency(String),
    /// A state path expression could not be parsed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by pipedrop crates.
pub type Result<T> = std::result::Result<T, Error>;
