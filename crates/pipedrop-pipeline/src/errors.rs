use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pipedrop_destination::DestinationError;
use pipedrop_plan::PlanError;

/// Pipeline steps that can fail inside a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Extract,
    Normalize,
    Load,
    Drop,
    SyncDestination,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extract => "extract",
            Self::Normalize => "normalize",
            Self::Load => "load",
            Self::Drop => "drop",
            Self::SyncDestination => "sync_destination",
        })
    }
}

/// Progress of a drop command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStage {
    Planned,
    TablesDropped,
    StateDropped,
    Persisted,
    DroppingAll,
    Done,
    Failed,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planned => "planned",
            Self::TablesDropped => "tables_dropped",
            Self::StateDropped => "state_dropped",
            Self::Persisted => "persisted",
            Self::DroppingAll => "dropping_all",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Errors raised by pipelines and by the drop command.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "pipeline '{pipeline_name}' in {} has pending extracted or load data; run normalize and load before dropping",
        pipelines_dir.display()
    )]
    PendingData {
        pipeline_name: String,
        pipelines_dir: PathBuf,
    },
    #[error("schema '{schema_name}' not found in pipeline '{pipeline_name}'")]
    UnknownSchema {
        pipeline_name: String,
        schema_name: String,
    },
    #[error("pipeline '{pipeline_name}' has no default schema")]
    NoDefaultSchema { pipeline_name: String },
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("core error: {0}")]
    Core(#[from] pipedrop_core::Error),
    #[error("destination error: {0}")]
    Destination(#[from] DestinationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("load package {package} has failed jobs: {reason}")]
    FailedJobs { package: String, reason: String },
    #[error(
        "pipeline '{pipeline_name}' (dataset '{dataset_name}') failed in step '{step}' after stage '{stage}': {source}"
    )]
    StepFailed {
        pipeline_name: String,
        dataset_name: String,
        step: PipelineStep,
        stage: DropStage,
        #[source]
        source: Box<PipelineError>,
    },
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Terminal errors will not go away when the operation is repeated.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::PendingData { .. }
            | Self::UnknownSchema { .. }
            | Self::NoDefaultSchema { .. }
            | Self::Plan(_)
            | Self::Core(_)
            | Self::Json(_)
            | Self::FailedJobs { .. } => true,
            Self::Destination(err) => err.is_terminal(),
            Self::StepFailed { source, .. } => source.is_terminal(),
            Self::Io(_) | Self::Other(_) => false,
        }
    }

    /// Step that failed, for errors raised inside a pipeline step.
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
