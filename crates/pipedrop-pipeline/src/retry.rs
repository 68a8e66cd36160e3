use crate::errors::{PipelineError, PipelineStep};

/// Retry predicate for pipeline errors.
///
/// Step failures are retried only for the listed steps and only when the
/// underlying error is transient. Other errors are retried unless terminal.
pub fn retry_load(retry_on: &[PipelineStep]) -> impl Fn(&PipelineError) -> bool + '_ {
    move |err: &PipelineError| match err.step() {
        Some(step) if !retry_on.contains(&step) => false,
        _ => !err.is_terminal(),
    }
}

/// Steps retried by default.
pub const DEFAULT_RETRY_STEPS: &[PipelineStep] = &[PipelineStep::Load];
