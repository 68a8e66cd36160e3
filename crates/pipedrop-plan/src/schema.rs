use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::DropInfo;

/// Emit the JSON Schema for the drop summary printed by dry runs.
pub fn drop_info_json_schema() -> RootSchema {
    schema_for!(DropInfo)
}
