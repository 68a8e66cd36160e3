#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use pipedrop_core::{Schema, StateTree, Table};
use pipedrop_destination::{
    DestinationClient, DestinationError, DestinationResult, SqlClient, StateRecord,
};
use pipedrop_pipeline::{Pipeline, PipelineError, PipelineResult};

/// Destination double recording every call.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    pub tables: Mutex<BTreeSet<String>>,
    pub drop_calls: Mutex<Vec<Vec<String>>>,
    pub states: Mutex<Vec<StateRecord>>,
    pub fail_drop: AtomicBool,
    pub dataset_dropped: AtomicBool,
}

impl MemoryDestination {
    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().unwrap().iter().cloned().collect()
    }

    pub fn drop_calls(&self) -> Vec<Vec<String>> {
        self.drop_calls.lock().unwrap().clone()
    }
}

struct MemoryClient {
    dataset_name: String,
    destination: Arc<MemoryDestination>,
}

#[async_trait]
impl DestinationClient for MemoryClient {
    fn engine(&self) -> &'static str {
        "memory"
    }

    fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    async fn drop_tables(&self, names: &[String]) -> DestinationResult<()> {
        self.destination.drop_calls.lock().unwrap().push(names.to_vec());
        if self.destination.fail_drop.load(Ordering::SeqCst) {
            return Err(DestinationError::Unavailable("destination offline".to_string()));
        }
        let mut tables = self.destination.tables.lock().unwrap();
        for name in names {
            tables.remove(name);
        }
        Ok(())
    }

    async fn store_state(&self, record: &StateRecord) -> DestinationResult<()> {
        self.destination.states.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn stored_state(&self, pipeline_name: &str) -> DestinationResult<Option<StateRecord>> {
        Ok(self
            .destination
            .states
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|record| record.pipeline_name == pipeline_name)
            .cloned())
    }
}

#[async_trait]
impl SqlClient for MemoryClient {
    fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    async fn drop_dataset(&self) -> DestinationResult<()> {
        self.destination.tables.lock().unwrap().clear();
        self.destination.states.lock().unwrap().clear();
        self.destination.dataset_dropped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Pipeline keeping schemas, state and packages in memory.
pub struct MemoryPipeline {
    pub name: String,
    pub dir: PathBuf,
    pub dataset: String,
    pub default_schema: Option<String>,
    pub schemas: BTreeMap<String, Schema>,
    pub saved_schemas: BTreeMap<String, Schema>,
    pub state: StateTree,
    pub extracted: Vec<StateTree>,
    pub normalized: Vec<StateTree>,
    pub loaded: Vec<StateTree>,
    pub destination: Arc<MemoryDestination>,
    pub fail_save: bool,
    pub fail_extract: bool,
    pub fail_load: bool,
    pub calls: Vec<&'static str>,
}

impl MemoryPipeline {
    pub fn new(schema: Schema, state: StateTree) -> Self {
        let destination = MemoryDestination::default();
        destination
            .tables
            .lock()
            .unwrap()
            .extend(schema.tables.keys().cloned());

        let mut schemas = BTreeMap::new();
        schemas.insert(schema.name.clone(), schema.clone());
        Self {
            name: "shop_pipeline".to_string(),
            dir: PathBuf::from("/tmp/pipedrop/shop_pipeline"),
            dataset: "shop_data".to_string(),
            default_schema: Some(schema.name.clone()),
            saved_schemas: schemas.clone(),
            schemas,
            state,
            extracted: Vec::new(),
            normalized: Vec::new(),
            loaded: Vec::new(),
            destination: Arc::new(destination),
            fail_save: false,
            fail_extract: false,
            fail_load: false,
            calls: Vec::new(),
        }
    }

    pub fn live_schema(&self) -> &Schema {
        let name = self.default_schema.as_deref().unwrap();
        &self.schemas[name]
    }

    fn client(&self) -> MemoryClient {
        MemoryClient {
            dataset_name: self.dataset.clone(),
            destination: Arc::clone(&self.destination),
        }
    }
}

#[async_trait]
impl Pipeline for MemoryPipeline {
    fn pipeline_name(&self) -> &str {
        &self.name
    }

    fn pipelines_dir(&self) -> &Path {
        &self.dir
    }

    fn dataset_name(&self) -> &str {
        &self.dataset
    }

    fn default_schema_name(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    fn replace_schema(&mut self, schema: Schema) {
        self.calls.push("replace_schema");
        self.schemas.insert(schema.name.clone(), schema);
    }

    async fn save_schema(&mut self, name: &str) -> PipelineResult<()> {
        self.calls.push("save_schema");
        if self.fail_save {
            return Err(PipelineError::Other("schema file is read-only".to_string()));
        }
        let schema = self.schemas.get(name).cloned().ok_or_else(|| {
            PipelineError::UnknownSchema {
                pipeline_name: self.name.clone(),
                schema_name: name.to_string(),
            }
        })?;
        self.saved_schemas.insert(name.to_string(), schema);
        Ok(())
    }

    fn state(&self) -> &StateTree {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateTree {
        &mut self.state
    }

    async fn extract_state(&mut self) -> PipelineResult<()> {
        self.calls.push("extract_state");
        if self.fail_extract {
            return Err(PipelineError::Other("cannot write extract package".to_string()));
        }
        self.extracted.push(self.state.clone());
        Ok(())
    }

    fn has_pending_data(&self) -> PipelineResult<bool> {
        Ok(!self.extracted.is_empty() || !self.normalized.is_empty())
    }

    async fn normalize(&mut self) -> PipelineResult<()> {
        self.calls.push("normalize");
        self.normalized.append(&mut self.extracted);
        Ok(())
    }

    async fn load(&mut self, raise_on_failed_jobs: bool) -> PipelineResult<()> {
        self.calls.push("load");
        assert!(raise_on_failed_jobs);
        if self.fail_load {
            return Err(PipelineError::Other("load job timed out".to_string()));
        }
        let client = self.client();
        for state in self.normalized.drain(..) {
            client
                .store_state(&StateRecord {
                    pipeline_name: self.name.clone(),
                    version: state.version(),
                    state: state.clone().into_value(),
                })
                .await?;
            self.loaded.push(state);
        }
        Ok(())
    }

    async fn drop_local(&mut self) -> PipelineResult<()> {
        self.calls.push("drop_local");
        self.schemas.clear();
        self.saved_schemas.clear();
        self.state = StateTree::new();
        self.extracted.clear();
        self.normalized.clear();
        Ok(())
    }

    async fn sync_destination(&mut self) -> PipelineResult<()> {
        self.calls.push("sync_destination");
        if let Some(record) = self.client().stored_state(&self.name).await? {
            self.state = StateTree::from_value(record.state)?;
        }
        Ok(())
    }

    async fn destination_client(
        &self,
        _schema: &Schema,
    ) -> PipelineResult<Box<dyn DestinationClient>> {
        Ok(Box::new(self.client()))
    }

    async fn sql_client(&self, _schema_name: &str) -> PipelineResult<Box<dyn SqlClient>> {
        Ok(Box::new(self.client()))
    }

    fn wipe_normalized_packages(&mut self) -> PipelineResult<()> {
        self.calls.push("wipe_normalized_packages");
        self.normalized.clear();
        Ok(())
    }
}

pub fn shop_schema() -> Schema {
    Schema::new("shop")
        .with_table(Table::new("users", "users").with_column("id", "bigint"))
        .with_table(Table::child("users__addresses", "users").with_column("city", "text"))
        .with_table(Table::new("orders", "orders").with_column("id", "bigint"))
        .with_table(Table::child("orders__items", "orders"))
}

pub fn shop_state() -> StateTree {
    StateTree::from_value(json!({
        "_state_version": 2,
        "sources": {
            "shop": {
                "config": {"token": "secret", "page_size": 50},
                "resources": {
                    "users": {"cursor": "2024-05-01"},
                    "orders": {"cursor": 981}
                }
            }
        }
    }))
    .unwrap()
}

pub fn shop_pipeline() -> MemoryPipeline {
    MemoryPipeline::new(shop_schema(), shop_state())
}
