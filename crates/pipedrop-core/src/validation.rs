use crate::error::{Error, Result};
use crate::graph::find_parent_cycle;
use crate::schema::Schema;

/// Validate internal consistency of a pipeline schema.
///
/// This checks:
/// - table map keys match table names
/// - parent tables exist and do not form cycles
/// - child tables do not claim a resource different from their root
pub fn validate_schema(schema: &Schema) -> Result<()> {
    for (key, table) in &schema.tables {
        if key != &table.name {
            return Err(Error::InvalidSchema(format!(
                "table registered as '{}' is named '{}' in schema '{}'",
                key, table.name, schema.name
            )));
        }

        if let Some(parent) = &table.parent {
            if !schema.tables.contains_key(parent) {
                return Err(Error::InvalidSchema(format!(
                    "parent table not found: {}.{} -> {}",
                    schema.name, table.name, parent
                )));
            }
        }
    }

    if let Some(cycle) = find_parent_cycle(schema) {
        return Err(Error::InvalidSchema(format!(
            "parent tables form a cycle in schema '{}': {}",
            schema.name,
            cycle.join(", ")
        )));
    }

    for table in schema.tables.values().filter(|table| !table.is_root()) {
        let Some(own) = table.resource.as_deref() else {
            continue;
        };
        if let Some(root) = schema.resource_of(&table.name) {
            if root != own {
                return Err(Error::InvalidSchema(format!(
                    "child table {}.{} declares resource '{}' but its root belongs to '{}'",
                    schema.name, table.name, own, root
                )));
            }
        }
    }

    Ok(())
}
