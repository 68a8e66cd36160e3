//! Core contracts and helpers for pipedrop.
//!
//! This crate defines the pipeline schema model, the table dependency graph,
//! the persisted state tree and the JSONPath queries used to address it. The
//! mutators that remove tables and state live next to the types they change.

pub mod error;
pub mod graph;
pub mod jsonpath;
pub mod schema;
pub mod state;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{TableTree, find_parent_cycle, group_tables_by_resource};
pub use jsonpath::{PathExpr, Step};
pub use schema::{Column, Schema, Table};
pub use state::{StateTree, delete_paths, reset_resource_state, resource_keys};
pub use validation::validate_schema;
