use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::Span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RegistryResult};

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the drop subscriber.
///
/// Every event is appended as one flattened JSON line to `path`, tagged with
/// the fields of the enclosing [`drop_span`]. Warnings and errors are echoed
/// to stderr. `RUST_LOG` narrows the file log.
pub fn init_drop_logging(path: &Path) -> RegistryResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file))
        .with_filter(filter);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))
}

/// Span correlating every event of one drop invocation.
pub fn drop_span(drop_id: &str, pipeline: &str, dry_run: bool) -> Span {
    tracing::info_span!("drop", drop_id = %drop_id, pipeline = %pipeline, dry_run)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn events_are_flattened_and_tagged_with_the_drop() {
        let dir = std::env::temp_dir().join(format!("pipedrop_log_{}", uuid::Uuid::new_v4()));
        let path = dir.join("logs").join("drop.ndjson");
        init_drop_logging(&path).unwrap();

        drop_span("d-42", "shop", true).in_scope(|| {
            tracing::info!(event = "drop_started", tables = 2);
        });

        let lines = std::fs::read_to_string(&path).unwrap();
        let line: Value = lines
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .find(|line| line["event"] == "drop_started")
            .expect("logged event");
        assert_eq!(line["tables"], 2);
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["span"]["drop_id"], "d-42");
        assert_eq!(line["span"]["pipeline"], "shop");
        assert!(line.get("fields").is_none());
        assert!(line.get("target").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
