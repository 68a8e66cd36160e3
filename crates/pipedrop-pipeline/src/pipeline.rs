use std::path::Path;

use async_trait::async_trait;

use pipedrop_core::{Schema, StateTree};
use pipedrop_destination::{DestinationClient, SqlClient};

use crate::errors::PipelineResult;

/// The pipeline surface a drop runs against.
///
/// Schemas and state are held in memory. The async methods persist them or
/// talk to the destination.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn pipeline_name(&self) -> &str;

    /// Working directory holding the local schemas, state and load packages.
    fn pipelines_dir(&self) -> &Path;

    fn dataset_name(&self) -> &str;

    fn default_schema_name(&self) -> Option<&str>;

    fn schema(&self, name: &str) -> Option<&Schema>;

    /// Install `schema` as the live schema under its own name.
    fn replace_schema(&mut self, schema: Schema);

    /// Persist the live schema named `name`.
    async fn save_schema(&mut self, name: &str) -> PipelineResult<()>;

    fn state(&self) -> &StateTree;

    fn state_mut(&mut self) -> &mut StateTree;

    /// Stage the current state so the next normalize and load carry it.
    async fn extract_state(&mut self) -> PipelineResult<()>;

    /// True when extracted or normalized packages wait for load.
    fn has_pending_data(&self) -> PipelineResult<bool>;

    async fn normalize(&mut self) -> PipelineResult<()>;

    /// Load normalized packages. With `raise_on_failed_jobs` a failed job
    /// surfaces as an error instead of a warning.
    async fn load(&mut self, raise_on_failed_jobs: bool) -> PipelineResult<()>;

    /// Reset the local working directory: schemas, state and packages.
    async fn drop_local(&mut self) -> PipelineResult<()>;

    /// Restore schemas and state from the destination, if it has any.
    async fn sync_destination(&mut self) -> PipelineResult<()>;

    async fn destination_client(
        &self,
        schema: &Schema,
    ) -> PipelineResult<Box<dyn DestinationClient>>;

    async fn sql_client(&self, schema_name: &str) -> PipelineResult<Box<dyn SqlClient>>;

    /// Discard normalized packages that were not loaded.
    fn wipe_normalized_packages(&mut self) -> PipelineResult<()>;
}
