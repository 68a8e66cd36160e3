use serde::{Deserialize, Serialize};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageStatus {
    Extracted,
    Normalized,
    Loaded,
}

/// `manifest.json` of a load package carrying a state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    pub package_id: String,
    pub pipeline_name: String,
    pub status: PackageStatus,
    pub state_version: u64,
    pub cli_version: String,
    pub created_at: String,
    pub loaded_at: Option<String>,
}
