use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DestinationResult;

/// Pipeline state snapshot as stored at the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub pipeline_name: String,
    pub version: u64,
    pub state: Value,
}

/// Client bound to one dataset of a destination catalog.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    fn dataset_name(&self) -> &str;

    /// Drop tables in the given order. Missing tables are ignored.
    async fn drop_tables(&self, names: &[String]) -> DestinationResult<()>;

    /// Append a state snapshot for a pipeline.
    async fn store_state(&self, record: &StateRecord) -> DestinationResult<()>;

    /// Most recent state snapshot of a pipeline, if any was stored.
    async fn stored_state(&self, pipeline_name: &str) -> DestinationResult<Option<StateRecord>>;
}

/// SQL-level operations on a whole dataset.
#[async_trait]
pub trait SqlClient: Send + Sync {
    fn dataset_name(&self) -> &str;

    /// Drop the dataset with everything in it. Missing datasets are ignored.
    async fn drop_dataset(&self) -> DestinationResult<()>;
}
