use pipedrop_core::{Schema, StateTree, Table, group_tables_by_resource};

use crate::errors::PlanResult;
use crate::model::{DropPlan, DropRequest, SourceStateDrop};
use crate::paths::{PathResolver, compile_paths};
use crate::pattern::{ResourceMatcher, ResourcePattern, match_state_keys};

/// Turns compiled selectors plus the current schema and state into a [`DropPlan`].
#[derive(Debug)]
pub struct DropPlanner {
    matcher: Option<Box<dyn ResourceMatcher>>,
    paths: Box<dyn PathResolver>,
    drop_all: bool,
    skip_state_wipe: bool,
}

impl DropPlanner {
    /// Planner over caller-provided matcher and resolver implementations.
    pub fn new(
        matcher: Option<Box<dyn ResourceMatcher>>,
        paths: Box<dyn PathResolver>,
    ) -> Self {
        Self {
            matcher,
            paths,
            drop_all: false,
            skip_state_wipe: false,
        }
    }

    /// Compile the selectors of a request with the built-in dialects.
    ///
    /// Invalid selectors fail here, even for `drop_all` requests.
    pub fn compile(request: &DropRequest) -> PlanResult<Self> {
        let matcher = ResourcePattern::compile(&request.resources)?
            .map(|pattern| Box::new(pattern) as Box<dyn ResourceMatcher>);
        let paths = compile_paths(&request.state_paths)?;

        Ok(Self {
            matcher,
            paths: Box::new(paths),
            drop_all: request.drop_all,
            skip_state_wipe: request.skip_state_wipe,
        })
    }

    pub fn with_drop_all(mut self, drop_all: bool) -> Self {
        self.drop_all = drop_all;
        self
    }

    pub fn with_skip_state_wipe(mut self, skip: bool) -> Self {
        self.skip_state_wipe = skip;
        self
    }

    /// Resource state is wiped only when resources were selected and the caller
    /// did not opt out.
    pub fn wipes_resource_state(&self) -> bool {
        self.matcher.is_some() && !self.skip_state_wipe
    }

    pub fn plan(&self, schema: &Schema, state: &StateTree, dataset_name: &str) -> DropPlan {
        let resource_pattern = self.matcher.as_ref().map(|matcher| matcher.describe());

        if self.drop_all {
            tracing::debug!(
                event = "drop_all_planned",
                schema = %schema.name,
                dataset = %dataset_name,
            );
            return DropPlan {
                schema_name: schema.name.clone(),
                dataset_name: dataset_name.to_string(),
                drop_all: true,
                drop_tables: false,
                drop_state: false,
                tables: Vec::new(),
                resource_names: Vec::new(),
                sources: Vec::new(),
                resource_pattern,
            };
        }

        let (tables, resource_names) = match &self.matcher {
            Some(matcher) => plan_tables(schema, matcher.as_ref()),
            None => (Vec::new(), Vec::new()),
        };

        let wipe = self.wipes_resource_state();
        let mut sources = Vec::new();
        for source in state.source_names() {
            let Some(source_state) = state.source(source) else {
                continue;
            };
            // paths are resolved against the untouched node, before any reset
            let paths = self.paths.resolve(source_state);
            let resource_keys = match (&self.matcher, wipe) {
                (Some(matcher), true) => match_state_keys(matcher.as_ref(), source_state),
                _ => Vec::new(),
            };
            let drop = SourceStateDrop {
                source: source.to_string(),
                resource_keys,
                paths,
            };
            if !drop.is_empty() {
                sources.push(drop);
            }
        }

        let plan = DropPlan {
            schema_name: schema.name.clone(),
            dataset_name: dataset_name.to_string(),
            drop_all: false,
            drop_tables: !tables.is_empty(),
            drop_state: wipe || !sources.is_empty(),
            tables,
            resource_names,
            sources,
            resource_pattern,
        };

        tracing::debug!(
            event = "drop_planned",
            schema = %plan.schema_name,
            dataset = %plan.dataset_name,
            tables = plan.tables.len(),
            sources = plan.sources.len(),
            drop_tables = plan.drop_tables,
            drop_state = plan.drop_state,
        );

        plan
    }
}

/// Tables of matching resources in reverse dependency order.
fn plan_tables(schema: &Schema, matcher: &dyn ResourceMatcher) -> (Vec<Table>, Vec<String>) {
    let groups = group_tables_by_resource(schema, |resource| matcher.is_match(resource));
    let resource_names: Vec<String> = groups.keys().cloned().collect();
    // every group lists parents first, so the reversed union drops children first
    let mut tables: Vec<Table> = groups.into_values().flatten().collect();
    tables.reverse();
    (tables, resource_names)
}

/// Compile `request` and plan it against `schema` and `state`.
pub fn plan_drop(
    schema: &Schema,
    state: &StateTree,
    request: &DropRequest,
    dataset_name: &str,
) -> PlanResult<DropPlan> {
    Ok(DropPlanner::compile(request)?.plan(schema, state, dataset_name))
}
