mod registry;
mod workspace;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use pipedrop_core::{group_tables_by_resource, resource_keys};
use pipedrop_pipeline::{DropCommand, Pipeline, PipelineError};
use pipedrop_plan::{DropInfo, DropRequest};
use registry::{
    DropRecord, DropStatus, RegistryError, drop_span, init_drop_logging, write_drop_record,
};
use workspace::{DESTINATION_ENV, LocalPipeline, WorkspaceError};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "pipedrop",
    version,
    about = "Selectively drop resources and state from a pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop resource tables and state, or the whole dataset.
    Drop(DropArgs),
    /// Show schemas, resources and state sources of a pipeline.
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Pipeline name.
    #[arg(long, short = 'p')]
    pipeline: String,
    /// Directory holding local pipelines.
    #[arg(long, default_value = "pipelines")]
    pipelines_dir: PathBuf,
    /// Destination connection string; overrides pipeline.toml.
    #[arg(long, env = DESTINATION_ENV, hide_env_values = true)]
    destination: Option<String>,
}

#[derive(Args, Debug)]
struct DropArgs {
    #[command(flatten)]
    target: PipelineArgs,
    /// Resource selectors: exact names, globs (`user*`) or `re:<regex>`.
    #[arg(value_name = "RESOURCE")]
    resources: Vec<String>,
    /// Schema to drop from; defaults to the pipeline default schema.
    #[arg(long)]
    schema: Option<String>,
    /// State path to delete from every source (repeatable).
    #[arg(long = "state-path", value_name = "PATH")]
    state_paths: Vec<String>,
    /// Drop the whole dataset and reset the local pipeline.
    #[arg(long, default_value_t = false, conflicts_with_all = ["resources", "state_paths"])]
    drop_all: bool,
    /// Keep the state of the selected resources.
    #[arg(long, default_value_t = false)]
    skip_state_wipe: bool,
    /// Print what would be dropped without changing anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    #[command(flatten)]
    target: PipelineArgs,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Drop(args) => run_drop(args).await,
        Command::Info(args) => run_info(args),
    }
}

async fn run_drop(args: DropArgs) -> Result<(), CliError> {
    let DropArgs {
        target,
        resources,
        schema,
        state_paths,
        drop_all,
        skip_state_wipe,
        dry_run,
    } = args;

    if resources.is_empty() && state_paths.is_empty() && !drop_all {
        return Err(CliError::InvalidArgs(
            "nothing to drop: pass resources, --state-path or --drop-all".to_string(),
        ));
    }

    let mut pipeline =
        LocalPipeline::open(&target.pipelines_dir, &target.pipeline, target.destination)?;
    let paths = pipeline.paths().clone();
    init_drop_logging(&paths.drop_log_path())?;

    let request = DropRequest {
        resources,
        schema_name: schema,
        state_paths,
        drop_all,
        skip_state_wipe,
    };
    let drop_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let destination = pipeline.destination_display();
    let span = drop_span(&drop_id, &target.pipeline, dry_run);

    span.in_scope(|| {
        tracing::info!(event = "drop_started", destination = ?destination);
    });

    let result = if dry_run {
        span.in_scope(|| DropCommand::new(&mut pipeline, &request).map(|command| command.info()))
    } else {
        pipedrop_pipeline::drop(&mut pipeline, &request)
            .instrument(span.clone())
            .await
    };

    let (status, info, error) = match &result {
        Ok(info) if dry_run => (DropStatus::DryRun, Some(info.clone()), None),
        Ok(info) => (DropStatus::Ok, Some(info.clone()), None),
        Err(err) => (DropStatus::Error, None, Some(err.to_string())),
    };
    let record = DropRecord {
        drop_id,
        pipeline_name: target.pipeline,
        started_at,
        finished_at: Utc::now(),
        status,
        request,
        destination,
        info,
        error,
    };
    let record_path = write_drop_record(&paths.drops_dir, &record)?;
    span.in_scope(|| {
        tracing::info!(
            event = "drop_finished",
            status = ?status,
            record = %record_path.display(),
        );
    });

    let info: DropInfo = result?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct PipelineInfo {
    pipeline_name: String,
    dataset_name: String,
    destination: Option<String>,
    default_schema_name: Option<String>,
    pending_data: bool,
    schemas: Vec<SchemaInfo>,
    /// Resource keys with state, per source.
    sources: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
struct SchemaInfo {
    name: String,
    version: u64,
    /// Table names per resource, parents first.
    resources: BTreeMap<String, Vec<String>>,
}

fn run_info(args: InfoArgs) -> Result<(), CliError> {
    let pipeline = LocalPipeline::open(
        &args.target.pipelines_dir,
        &args.target.pipeline,
        args.target.destination,
    )?;

    let schemas = pipeline
        .schemas()
        .map(|schema| SchemaInfo {
            name: schema.name.clone(),
            version: schema.version,
            resources: group_tables_by_resource(schema, |_| true)
                .into_iter()
                .map(|(resource, tables)| {
                    (resource, tables.into_iter().map(|table| table.name).collect())
                })
                .collect(),
        })
        .collect();

    let state = pipeline.state();
    let sources = state
        .source_names()
        .into_iter()
        .filter_map(|name| {
            let keys = resource_keys(state.source(name)?)
                .into_iter()
                .map(str::to_string)
                .collect();
            Some((name.to_string(), keys))
        })
        .collect();

    let info = PipelineInfo {
        pipeline_name: pipeline.pipeline_name().to_string(),
        dataset_name: pipeline.dataset_name().to_string(),
        destination: pipeline.destination_display(),
        default_schema_name: pipeline.default_schema_name().map(str::to_string),
        pending_data: pipeline.has_pending_data()?,
        schemas,
        sources,
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
