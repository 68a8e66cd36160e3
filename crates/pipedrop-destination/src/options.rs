use std::time::Duration;

/// Name of the table that stores pipeline state snapshots at the destination.
pub const STATE_TABLE: &str = "_pipedrop_pipeline_state";

/// Options that control how a destination connection behaves.
#[derive(Debug, Clone)]
pub struct DestinationOptions {
    /// Dataset (Postgres schema) holding the pipeline tables.
    pub dataset_name: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DestinationOptions {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            ..Self::default()
        }
    }
}

impl Default for DestinationOptions {
    fn default() -> Self {
        Self {
            dataset_name: "public".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}
