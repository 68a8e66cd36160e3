mod atomic;
mod ids;
mod local;
mod manifests;
mod paths;
mod settings;

pub use atomic::write_json_atomic;
pub use local::LocalPipeline;
pub use paths::PipelinePaths;
pub use settings::DESTINATION_ENV;

use std::io;

use thiserror::Error;

use pipedrop_pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("core error: {0}")]
    Core(#[from] pipedrop_core::Error),
    #[error("invalid pipeline directory: {0}")]
    Invalid(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

impl From<WorkspaceError> for PipelineError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Io(err) => PipelineError::Io(err),
            WorkspaceError::Json(err) => PipelineError::Json(err),
            WorkspaceError::Core(err) => PipelineError::Core(err),
            other => PipelineError::Other(other.to_string()),
        }
    }
}
