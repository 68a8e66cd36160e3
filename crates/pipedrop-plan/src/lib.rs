//! Drop planning: resource selectors, state path selectors and the immutable
//! plan that separates deciding what to drop from actually dropping it.

pub mod errors;
pub mod model;
pub mod paths;
pub mod pattern;
pub mod planner;
pub mod schema;

pub use errors::{PlanError, PlanResult};
pub use model::{DropInfo, DropPlan, DropRequest, SourceStateDrop};
pub use paths::{CompiledPaths, PathResolver, compile_paths};
pub use pattern::{ResourceMatcher, ResourcePattern, match_state_keys};
pub use planner::{DropPlanner, plan_drop};
pub use schema::drop_info_json_schema;
