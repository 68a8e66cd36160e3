use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pipedrop_core::Table;

/// What the caller asked to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRequest {
    /// Resource selectors (exact names, globs or `re:` expressions).
    #[serde(default)]
    pub resources: Vec<String>,
    /// Schema to drop from; the pipeline default schema when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// State path expressions deleted from every source.
    #[serde(default)]
    pub state_paths: Vec<String>,
    /// Drop the whole dataset and reset the local pipeline.
    #[serde(default)]
    pub drop_all: bool,
    /// Keep resource state even though resources are selected.
    #[serde(default)]
    pub skip_state_wipe: bool,
}

impl DropRequest {
    pub fn resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            drop_all: true,
            ..Self::default()
        }
    }

    pub fn with_state_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn skip_state_wipe(mut self) -> Self {
        self.skip_state_wipe = true;
        self
    }
}

/// State changes planned for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStateDrop {
    pub source: String,
    /// Resources whose whole state is removed.
    pub resource_keys: Vec<String>,
    /// Concrete paths resolved against the untouched source state.
    pub paths: Vec<String>,
}

impl SourceStateDrop {
    pub fn is_empty(&self) -> bool {
        self.resource_keys.is_empty() && self.paths.is_empty()
    }
}

/// Immutable description of a drop, computed before anything is mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropPlan {
    pub(crate) schema_name: String,
    pub(crate) dataset_name: String,
    pub(crate) drop_all: bool,
    pub(crate) drop_tables: bool,
    pub(crate) drop_state: bool,
    pub(crate) tables: Vec<Table>,
    pub(crate) resource_names: Vec<String>,
    pub(crate) sources: Vec<SourceStateDrop>,
    pub(crate) resource_pattern: Option<String>,
}

impl DropPlan {
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn drop_all(&self) -> bool {
        self.drop_all
    }

    pub fn drop_tables(&self) -> bool {
        self.drop_tables
    }

    pub fn drop_state(&self) -> bool {
        self.drop_state
    }

    /// Tables to drop, children before their parents.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    pub fn resource_names(&self) -> &[String] {
        &self.resource_names
    }

    pub fn sources(&self) -> &[SourceStateDrop] {
        &self.sources
    }

    /// True when applying the plan would neither drop tables nor touch state.
    pub fn is_noop(&self) -> bool {
        !self.drop_all && !self.drop_tables && !self.drop_state
    }

    /// True when no table, resource state or path was selected.
    pub fn selects_nothing(&self) -> bool {
        self.tables.is_empty() && self.sources.iter().all(SourceStateDrop::is_empty)
    }

    /// Caller-facing summary, available before the plan is applied.
    pub fn info(&self) -> DropInfo {
        DropInfo {
            tables: self.table_names(),
            resource_states: self
                .sources
                .iter()
                .flat_map(|source| source.resource_keys.iter().cloned())
                .collect(),
            resource_names: self.resource_names.clone(),
            state_paths: self
                .sources
                .iter()
                .flat_map(|source| {
                    source
                        .paths
                        .iter()
                        .map(move |path| format!("{}.{}", source.source, path))
                })
                .collect(),
            schema_name: self.schema_name.clone(),
            dataset_name: self.dataset_name.clone(),
            drop_all: self.drop_all,
            resource_pattern: self.resource_pattern.clone(),
        }
    }
}

/// Audit record of a drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DropInfo {
    /// Dropped table names, in drop order.
    pub tables: Vec<String>,
    /// Resource keys whose state is reset (one entry per source).
    pub resource_states: Vec<String>,
    /// Resources that owned at least one dropped table.
    pub resource_names: Vec<String>,
    /// Deleted state paths qualified by source name (`source.path`).
    pub state_paths: Vec<String>,
    pub schema_name: String,
    pub dataset_name: String,
    pub drop_all: bool,
    /// Compiled resource pattern, absent when no resource was selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pattern: Option<String>,
}
