use serde::{Deserialize, Serialize};

use super::atomic::write_bytes_atomic;
use super::{PipelinePaths, WorkspaceError, WorkspaceResult};

/// Environment variable overriding the configured destination.
pub const DESTINATION_ENV: &str = "PIPEDROP_DESTINATION";

/// `pipeline.toml` of a local pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub dataset_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema_name: Option<String>,
    /// Destination connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

impl PipelineSettings {
    pub fn for_pipeline(pipeline_name: &str) -> Self {
        Self {
            dataset_name: format!("{pipeline_name}_dataset"),
            default_schema_name: None,
            destination: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

pub fn load_or_create_settings(
    paths: &PipelinePaths,
    pipeline_name: &str,
) -> WorkspaceResult<PipelineSettings> {
    let path = paths.settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: PipelineSettings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = PipelineSettings::for_pipeline(pipeline_name);
    save_settings(paths, &settings)?;
    Ok(settings)
}

pub fn save_settings(paths: &PipelinePaths, settings: &PipelineSettings) -> WorkspaceResult<()> {
    let path = paths.settings_path();
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(&path, encoded.as_bytes()).map_err(WorkspaceError::from)
}
