//! Selective drop of resources and state from a pipeline.

pub mod command;
pub mod errors;
pub mod managed;
pub mod pipeline;
pub mod retry;

pub use command::{DropCommand, drop};
pub use errors::{DropStage, PipelineError, PipelineResult, PipelineStep};
pub use managed::ManagedState;
pub use pipeline::Pipeline;
pub use retry::{DEFAULT_RETRY_STEPS, retry_load};
