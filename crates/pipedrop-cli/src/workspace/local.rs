use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use pipedrop_core::{Schema, StateTree, validate_schema};
use pipedrop_destination::{
    DestinationClient, DestinationOptions, PostgresDestination, SqlClient, StateRecord,
    redact_connection_string,
};
use pipedrop_pipeline::{Pipeline, PipelineError, PipelineResult};

use super::atomic::{read_json, write_json_atomic};
use super::ids::new_package_id;
use super::manifests::{CLI_VERSION, PackageManifest, PackageStatus};
use super::settings::{DESTINATION_ENV, PipelineSettings, load_or_create_settings};
use super::{PipelinePaths, WorkspaceError, WorkspaceResult};

const PACKAGE_STATE_FILE: &str = "state.json";
const PACKAGE_MANIFEST_FILE: &str = "manifest.json";
const SCHEMA_SUFFIX: &str = ".schema.json";

/// Pipeline backed by a local working directory and a Postgres destination.
pub struct LocalPipeline {
    name: String,
    pipelines_dir: PathBuf,
    paths: PipelinePaths,
    settings: PipelineSettings,
    destination: Option<String>,
    schemas: BTreeMap<String, Schema>,
    state: StateTree,
}

impl LocalPipeline {
    /// Open (or initialise) the pipeline `name` under `pipelines_dir`.
    ///
    /// `destination` overrides the connection string from `pipeline.toml`.
    pub fn open(
        pipelines_dir: &Path,
        name: &str,
        destination: Option<String>,
    ) -> WorkspaceResult<Self> {
        let paths = PipelinePaths::new(pipelines_dir, name);
        paths.ensure_dirs()?;
        let settings = load_or_create_settings(&paths, name)?;
        let destination = destination.or_else(|| settings.destination.clone());
        let schemas = load_schemas(&paths)?;
        let state = read_json::<StateTree>(&paths.state_path())?.unwrap_or_default();

        tracing::debug!(
            event = "pipeline_opened",
            pipeline = %name,
            root = %paths.root.display(),
            schemas = schemas.len(),
            destination = ?destination.as_deref().map(redact_connection_string),
        );

        Ok(Self {
            name: name.to_string(),
            pipelines_dir: pipelines_dir.to_path_buf(),
            paths,
            settings,
            destination,
            schemas,
            state,
        })
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Redacted destination connection string, if one is configured.
    pub fn destination_display(&self) -> Option<String> {
        self.destination.as_deref().map(redact_connection_string)
    }

    async fn connect(&self) -> PipelineResult<PostgresDestination> {
        let Some(conn) = self.destination.as_deref() else {
            return Err(PipelineError::Other(format!(
                "pipeline '{}' has no destination; set `destination` in {} or {DESTINATION_ENV}",
                self.name,
                self.paths.settings_path().display()
            )));
        };
        let options = DestinationOptions {
            dataset_name: self.settings.dataset_name.clone(),
            max_connections: self.settings.max_connections,
            acquire_timeout: Duration::from_secs(self.settings.acquire_timeout_secs),
        };
        Ok(PostgresDestination::connect(conn, &options).await?)
    }

    fn write_state(&self) -> WorkspaceResult<()> {
        write_json_atomic(&self.paths.state_path(), &self.state)
    }

    fn move_package(
        &self,
        from: &Path,
        to_dir: &Path,
        status: PackageStatus,
    ) -> WorkspaceResult<()> {
        let package_id = package_id(from)?;
        let manifest_path = from.join(PACKAGE_MANIFEST_FILE);
        if let Some(mut manifest) = read_json::<PackageManifest>(&manifest_path)? {
            manifest.status = status;
            if status == PackageStatus::Loaded {
                manifest.loaded_at = Some(chrono::Utc::now().to_rfc3339());
            }
            write_json_atomic(&manifest_path, &manifest)?;
        }
        std::fs::rename(from, to_dir.join(package_id))?;
        Ok(())
    }
}

#[async_trait]
impl Pipeline for LocalPipeline {
    fn pipeline_name(&self) -> &str {
        &self.name
    }

    fn pipelines_dir(&self) -> &Path {
        &self.pipelines_dir
    }

    fn dataset_name(&self) -> &str {
        &self.settings.dataset_name
    }

    fn default_schema_name(&self) -> Option<&str> {
        self.settings
            .default_schema_name
            .as_deref()
            .or_else(|| self.schemas.keys().next().map(String::as_str))
    }

    fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    fn replace_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    async fn save_schema(&mut self, name: &str) -> PipelineResult<()> {
        let schema = self.schemas.get(name).ok_or_else(|| PipelineError::UnknownSchema {
            pipeline_name: self.name.clone(),
            schema_name: name.to_string(),
        })?;
        write_json_atomic(&self.paths.schema_path(name), schema)?;
        tracing::debug!(event = "schema_saved", schema = %name, version = schema.version);
        Ok(())
    }

    fn state(&self) -> &StateTree {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateTree {
        &mut self.state
    }

    async fn extract_state(&mut self) -> PipelineResult<()> {
        let package_id = new_package_id();
        let package_dir = self.paths.extracted_dir.join(&package_id);
        write_json_atomic(&package_dir.join(PACKAGE_STATE_FILE), &self.state)?;
        let manifest = PackageManifest {
            package_id: package_id.clone(),
            pipeline_name: self.name.clone(),
            status: PackageStatus::Extracted,
            state_version: self.state.version(),
            cli_version: CLI_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            loaded_at: None,
        };
        write_json_atomic(&package_dir.join(PACKAGE_MANIFEST_FILE), &manifest)?;
        self.write_state()?;

        tracing::info!(
            event = "state_extracted",
            pipeline = %self.name,
            package_id = %package_id,
            version = manifest.state_version,
        );
        Ok(())
    }

    fn has_pending_data(&self) -> PipelineResult<bool> {
        Ok(!package_dirs(&self.paths.extracted_dir)?.is_empty()
            || !package_dirs(&self.paths.normalized_dir)?.is_empty())
    }

    async fn normalize(&mut self) -> PipelineResult<()> {
        for package in package_dirs(&self.paths.extracted_dir)? {
            self.move_package(&package, &self.paths.normalized_dir, PackageStatus::Normalized)?;
        }
        Ok(())
    }

    async fn load(&mut self, raise_on_failed_jobs: bool) -> PipelineResult<()> {
        let packages = package_dirs(&self.paths.normalized_dir)?;
        if packages.is_empty() {
            return Ok(());
        }

        let destination = match &self.destination {
            Some(_) => Some(self.connect().await?),
            None => {
                tracing::warn!(
                    event = "load_without_destination",
                    pipeline = %self.name,
                    packages = packages.len(),
                );
                None
            }
        };

        for package in packages {
            if let Some(destination) = &destination {
                let state: StateTree = read_json(&package.join(PACKAGE_STATE_FILE))?
                    .ok_or_else(|| PipelineError::FailedJobs {
                        package: package.display().to_string(),
                        reason: "package has no state file".to_string(),
                    })?;
                let record = StateRecord {
                    pipeline_name: self.name.clone(),
                    version: state.version(),
                    state: state.into_value(),
                };
                if let Err(err) = destination.store_state(&record).await {
                    if raise_on_failed_jobs {
                        return Err(err.into());
                    }
                    tracing::warn!(
                        event = "load_job_failed",
                        package = %package.display(),
                        error = %err,
                    );
                    continue;
                }
            }
            self.move_package(&package, &self.paths.loaded_dir, PackageStatus::Loaded)?;
        }
        Ok(())
    }

    async fn drop_local(&mut self) -> PipelineResult<()> {
        for dir in [&self.paths.schemas_dir, &self.paths.load_dir] {
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        let state_path = self.paths.state_path();
        if state_path.exists() {
            std::fs::remove_file(&state_path)?;
        }
        self.paths.ensure_dirs()?;
        self.schemas.clear();
        self.state = StateTree::new();

        tracing::info!(event = "local_pipeline_dropped", pipeline = %self.name);
        Ok(())
    }

    async fn sync_destination(&mut self) -> PipelineResult<()> {
        if self.destination.is_none() {
            return Ok(());
        }
        let destination = self.connect().await?;
        match destination.stored_state(&self.name).await? {
            Some(record) => {
                self.state = StateTree::from_value(record.state)?;
                self.write_state()?;
                tracing::info!(
                    event = "state_restored",
                    pipeline = %self.name,
                    version = record.version,
                );
            }
            None => {
                tracing::info!(event = "no_remote_state", pipeline = %self.name);
            }
        }
        Ok(())
    }

    async fn destination_client(
        &self,
        _schema: &Schema,
    ) -> PipelineResult<Box<dyn DestinationClient>> {
        Ok(Box::new(self.connect().await?))
    }

    async fn sql_client(&self, _schema_name: &str) -> PipelineResult<Box<dyn SqlClient>> {
        Ok(Box::new(self.connect().await?))
    }

    fn wipe_normalized_packages(&mut self) -> PipelineResult<()> {
        for package in package_dirs(&self.paths.normalized_dir)? {
            std::fs::remove_dir_all(&package)?;
        }
        Ok(())
    }
}

fn load_schemas(paths: &PipelinePaths) -> WorkspaceResult<BTreeMap<String, Schema>> {
    let mut schemas = BTreeMap::new();
    for entry in std::fs::read_dir(&paths.schemas_dir)? {
        let path = entry?.path();
        let is_schema = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(SCHEMA_SUFFIX));
        if !is_schema {
            continue;
        }
        let Some(schema) = read_json::<Schema>(&path)? else {
            continue;
        };
        validate_schema(&schema)?;
        schemas.insert(schema.name.clone(), schema);
    }
    Ok(schemas)
}

/// Package directories in `dir`, oldest first.
fn package_dirs(dir: &Path) -> WorkspaceResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut packages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            packages.push(entry.path());
        }
    }
    packages.sort();
    Ok(packages)
}

fn package_id(path: &Path) -> WorkspaceResult<&std::ffi::OsStr> {
    path.file_name()
        .ok_or_else(|| WorkspaceError::Invalid(format!("invalid package path {}", path.display())))
}
