use std::ops::{Deref, DerefMut};

use pipedrop_core::StateTree;

use crate::errors::PipelineResult;
use crate::pipeline::Pipeline;

/// Exclusive, transactional access to the state of a pipeline.
///
/// Changes made through the guard are staged by [`ManagedState::commit`].
/// A guard dropped without a successful commit puts the snapshot taken at
/// acquisition back, whatever the exit path was.
pub struct ManagedState<'p, P: Pipeline + ?Sized> {
    pipeline: &'p mut P,
    snapshot: Option<StateTree>,
    extract_unchanged: bool,
}

impl<'p, P: Pipeline + ?Sized> ManagedState<'p, P> {
    pub fn acquire(pipeline: &'p mut P, extract_unchanged: bool) -> Self {
        let snapshot = pipeline.state().clone();
        Self {
            pipeline,
            snapshot: Some(snapshot),
            extract_unchanged,
        }
    }

    pub fn changed(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot != self.pipeline.state())
    }

    /// Bump the state version when the content changed and stage the state.
    pub async fn commit(mut self) -> PipelineResult<()> {
        let changed = self.changed();
        if changed {
            self.pipeline.state_mut().bump_version();
        }
        if changed || self.extract_unchanged {
            self.pipeline.extract_state().await?;
        }
        tracing::debug!(
            event = "state_committed",
            pipeline = %self.pipeline.pipeline_name(),
            version = self.pipeline.state().version(),
            changed,
        );
        self.snapshot = None;
        Ok(())
    }
}

impl<P: Pipeline + ?Sized> Deref for ManagedState<'_, P> {
    type Target = StateTree;

    fn deref(&self) -> &StateTree {
        self.pipeline.state()
    }
}

impl<P: Pipeline + ?Sized> DerefMut for ManagedState<'_, P> {
    fn deref_mut(&mut self) -> &mut StateTree {
        self.pipeline.state_mut()
    }
}

impl<P: Pipeline + ?Sized> Drop for ManagedState<'_, P> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::warn!(
                event = "state_rolled_back",
                pipeline = %self.pipeline.pipeline_name(),
            );
            *self.pipeline.state_mut() = snapshot;
        }
    }
}
