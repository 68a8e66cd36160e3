mod audit;
mod logging;

pub use audit::{DropRecord, DropStatus, write_drop_record};
pub use logging::{drop_span, init_drop_logging};

use thiserror::Error;

use crate::workspace::WorkspaceError;

/// Errors writing drop logs and audit records.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
