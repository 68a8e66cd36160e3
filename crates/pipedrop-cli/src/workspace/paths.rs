use std::path::{Path, PathBuf};

use super::{WorkspaceError, WorkspaceResult};

/// Layout of one local pipeline directory.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub root: PathBuf,
    pub schemas_dir: PathBuf,
    pub load_dir: PathBuf,
    pub extracted_dir: PathBuf,
    pub normalized_dir: PathBuf,
    pub loaded_dir: PathBuf,
    pub drops_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(pipelines_dir: &Path, pipeline_name: &str) -> Self {
        let root = pipelines_dir.join(pipeline_name);
        let schemas_dir = root.join("schemas");
        let load_dir = root.join("load");
        let extracted_dir = load_dir.join("extracted");
        let normalized_dir = load_dir.join("normalized");
        let loaded_dir = load_dir.join("loaded");
        let drops_dir = root.join("drops");
        let logs_dir = root.join("logs");
        Self {
            root,
            schemas_dir,
            load_dir,
            extracted_dir,
            normalized_dir,
            loaded_dir,
            drops_dir,
            logs_dir,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("pipeline.toml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn schema_path(&self, schema_name: &str) -> PathBuf {
        self.schemas_dir.join(format!("{schema_name}.schema.json"))
    }

    pub fn drop_log_path(&self) -> PathBuf {
        self.logs_dir.join("drop.ndjson")
    }

    pub fn ensure_dirs(&self) -> WorkspaceResult<()> {
        create_if_missing(&self.root)?;
        create_if_missing(&self.schemas_dir)?;
        create_if_missing(&self.extracted_dir)?;
        create_if_missing(&self.normalized_dir)?;
        create_if_missing(&self.loaded_dir)?;
        create_if_missing(&self.drops_dir)?;
        create_if_missing(&self.logs_dir)?;
        Ok(())
    }
}

fn create_if_missing(path: &Path) -> WorkspaceResult<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(WorkspaceError::from)
}
