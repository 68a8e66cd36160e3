use pipedrop_core::{Schema, StateTree, delete_paths, reset_resource_state};
use pipedrop_plan::{DropInfo, DropPlan, DropRequest, plan_drop};

use crate::errors::{DropStage, PipelineError, PipelineResult, PipelineStep};
use crate::managed::ManagedState;
use crate::pipeline::Pipeline;

/// Selective drop of resources and state from a pipeline and its destination.
///
/// The plan is computed when the command is built, so [`DropCommand::info`]
/// works as a dry run. [`DropCommand::run`] applies it.
pub struct DropCommand<'p, P: Pipeline + ?Sized> {
    pipeline: &'p mut P,
    plan: DropPlan,
    schema: Schema,
    new_state: StateTree,
    stage: DropStage,
}

impl<'p, P: Pipeline + ?Sized> DropCommand<'p, P> {
    pub fn new(pipeline: &'p mut P, request: &DropRequest) -> PipelineResult<Self> {
        let schema_name = match &request.schema_name {
            Some(name) => name.clone(),
            None => pipeline
                .default_schema_name()
                .map(str::to_string)
                .ok_or_else(|| PipelineError::NoDefaultSchema {
                    pipeline_name: pipeline.pipeline_name().to_string(),
                })?,
        };
        let schema = pipeline.schema(&schema_name).cloned().ok_or_else(|| {
            PipelineError::UnknownSchema {
                pipeline_name: pipeline.pipeline_name().to_string(),
                schema_name: schema_name.clone(),
            }
        })?;

        let plan = plan_drop(&schema, pipeline.state(), request, pipeline.dataset_name())?;
        let new_state = apply_state_drops(pipeline.state(), &plan)?;

        tracing::info!(
            event = "drop_planned",
            pipeline = %pipeline.pipeline_name(),
            schema = %plan.schema_name(),
            dataset = %plan.dataset_name(),
            drop_all = plan.drop_all(),
            tables = plan.tables().len(),
            drop_state = plan.drop_state(),
        );

        Ok(Self {
            pipeline,
            plan,
            schema,
            new_state,
            stage: DropStage::Planned,
        })
    }

    pub fn info(&self) -> DropInfo {
        self.plan.info()
    }

    pub fn plan(&self) -> &DropPlan {
        &self.plan
    }

    pub fn stage(&self) -> DropStage {
        self.stage
    }

    /// State the pipeline will hold once the drop is applied.
    pub fn new_state(&self) -> &StateTree {
        &self.new_state
    }

    pub async fn run(mut self) -> PipelineResult<DropInfo> {
        if self.pipeline.has_pending_data()? {
            return Err(PipelineError::PendingData {
                pipeline_name: self.pipeline.pipeline_name().to_string(),
                pipelines_dir: self.pipeline.pipelines_dir().to_path_buf(),
            });
        }

        let info = self.plan.info();

        if self.plan.drop_all() {
            self.stage = DropStage::DroppingAll;
            if let Err(err) = self.drop_everything().await {
                return Err(self.step_failed(PipelineStep::Drop, err));
            }
            self.finish(&info);
            return Ok(info);
        }

        if self.plan.is_noop() {
            tracing::info!(
                event = "drop_skipped",
                pipeline = %self.pipeline.pipeline_name(),
                reason = "nothing selected",
            );
            self.stage = DropStage::Done;
            return Ok(info);
        }

        if self.plan.drop_tables() {
            if let Err(err) = self.drop_tables().await {
                return Err(self.step_failed(PipelineStep::Drop, err));
            }
            self.advance(DropStage::TablesDropped);
        }

        if self.plan.drop_state() {
            if let Err(err) = self.drop_state().await {
                return Err(self.step_failed(PipelineStep::Extract, err));
            }
            self.advance(DropStage::StateDropped);
        }

        self.advance(DropStage::Persisted);

        if let Err(err) = self.pipeline.normalize().await {
            return Err(self.step_failed(PipelineStep::Normalize, err));
        }
        if let Err(err) = self.pipeline.load(true).await {
            if let Err(wipe_err) = self.pipeline.wipe_normalized_packages() {
                tracing::error!(
                    event = "normalized_packages_wipe_failed",
                    pipeline = %self.pipeline.pipeline_name(),
                    error = %wipe_err,
                );
            }
            return Err(self.step_failed(PipelineStep::Load, err));
        }

        self.finish(&info);
        Ok(info)
    }

    async fn drop_everything(&mut self) -> PipelineResult<()> {
        {
            let client = self.pipeline.sql_client(&self.schema.name).await?;
            client.drop_dataset().await?;
        }
        self.pipeline.drop_local().await?;
        self.pipeline.sync_destination().await
    }

    async fn drop_tables(&mut self) -> PipelineResult<()> {
        let names = self.plan.table_names();
        let previous = self.pipeline.schema(&self.schema.name).cloned();
        self.schema.remove_tables(&names)?;
        // the reduced schema is live and on disk before the destination is
        // touched, so a repeated request has nothing left to drop
        self.pipeline.replace_schema(self.schema.clone());
        if let Err(err) = self.pipeline.save_schema(&self.schema.name).await {
            if let Some(previous) = previous {
                self.pipeline.replace_schema(previous);
            }
            return Err(err);
        }

        let client = self.pipeline.destination_client(&self.schema).await?;
        client.drop_tables(&names).await?;
        tracing::info!(
            event = "tables_dropped",
            pipeline = %self.pipeline.pipeline_name(),
            dataset = %client.dataset_name(),
            tables = ?names,
        );
        Ok(())
    }

    async fn drop_state(&mut self) -> PipelineResult<()> {
        let mut state = ManagedState::acquire(&mut *self.pipeline, true);
        state.clear();
        state.replace_with(self.new_state.clone());
        state.commit().await
    }

    fn advance(&mut self, stage: DropStage) {
        tracing::debug!(
            event = "drop_stage",
            pipeline = %self.pipeline.pipeline_name(),
            stage = %stage,
        );
        self.stage = stage;
    }

    fn finish(&mut self, info: &DropInfo) {
        self.stage = DropStage::Done;
        tracing::info!(
            event = "drop_completed",
            pipeline = %self.pipeline.pipeline_name(),
            dataset = %info.dataset_name,
            drop_all = info.drop_all,
            tables = info.tables.len(),
            resource_states = info.resource_states.len(),
            state_paths = info.state_paths.len(),
        );
    }

    fn step_failed(&mut self, step: PipelineStep, source: PipelineError) -> PipelineError {
        let stage = self.stage;
        self.stage = DropStage::Failed;
        tracing::error!(
            event = "drop_failed",
            pipeline = %self.pipeline.pipeline_name(),
            step = %step,
            stage = %stage,
            error = %source,
        );
        PipelineError::StepFailed {
            pipeline_name: self.pipeline.pipeline_name().to_string(),
            dataset_name: self.pipeline.dataset_name().to_string(),
            step,
            stage,
            source: Box::new(source),
        }
    }
}

/// Copy of `state` with the planned resets and path deletions applied.
fn apply_state_drops(state: &StateTree, plan: &DropPlan) -> PipelineResult<StateTree> {
    let mut new_state = state.clone();
    if !plan.drop_state() {
        return Ok(new_state);
    }
    for source in plan.sources() {
        let Some(node) = new_state.source_mut(&source.source) else {
            continue;
        };
        for key in &source.resource_keys {
            reset_resource_state(key, node);
        }
        delete_paths(&source.paths, node)?;
    }
    Ok(new_state)
}

/// Plan and apply `request` against `pipeline` in one call.
pub async fn drop<P>(pipeline: &mut P, request: &DropRequest) -> PipelineResult<DropInfo>
where
    P: Pipeline + ?Sized,
{
    DropCommand::new(pipeline, request)?.run().await
}
