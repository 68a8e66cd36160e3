use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Versioned collection of table definitions owned by a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub name: String,
    /// Incremented on every structural change.
    #[serde(default)]
    pub version: u64,
    /// Tables keyed by their unique name.
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

/// A table produced by a resource, or a child table nested under another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    /// Owning resource. Child tables inherit it from their root table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Parent table for nested (derived) tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// Column metadata for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Schema {
    /// Create an empty schema at version 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            tables: BTreeMap::new(),
        }
    }

    /// Insert a table, replacing any table with the same name.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Remove the named tables and bump the version once.
    ///
    /// Every name is checked before anything is removed, so a failed call
    /// leaves the schema untouched.
    pub fn remove_tables<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.tables.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::SchemaConsistency(format!(
                "tables not found in schema '{}': {}",
                self.name,
                missing.join(", ")
            )));
        }

        for name in names {
            self.tables.remove(name.as_ref());
        }
        self.bump_version();
        Ok(())
    }

    /// Resolve the owning resource of a table by walking up to its root.
    pub fn resource_of(&self, table_name: &str) -> Option<&str> {
        let mut current = self.tables.get(table_name)?;
        let mut hops = 0;
        while let Some(parent) = current.parent.as_deref() {
            // a parent cycle is rejected by validation; guard against looping anyway
            if hops > self.tables.len() {
                return None;
            }
            current = self.tables.get(parent)?;
            hops += 1;
        }
        current.resource.as_deref()
    }
}

impl Table {
    /// Root table owned by `resource`.
    pub fn new(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: Some(resource.into()),
            parent: None,
            description: None,
            columns: Vec::new(),
        }
    }

    /// Child table nested under `parent`.
    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            parent: Some(parent.into()),
            description: None,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: &str, data_type: &str) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
        });
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
