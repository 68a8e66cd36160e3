use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use pipedrop_plan::{DropInfo, DropRequest};

use super::RegistryResult;
use crate::workspace::write_json_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropStatus {
    DryRun,
    Ok,
    Error,
}

/// Audit record written for every drop invocation.
#[derive(Debug, Serialize)]
pub struct DropRecord {
    pub drop_id: String,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: DropStatus,
    pub request: DropRequest,
    /// Redacted destination connection string.
    pub destination: Option<String>,
    pub info: Option<DropInfo>,
    pub error: Option<String>,
}

/// Write `record` to `<drops_dir>/<timestamp>__drop_<id>.json`.
///
/// The record is replaced atomically, so a crash never leaves a truncated file.
pub fn write_drop_record(drops_dir: &Path, record: &DropRecord) -> RegistryResult<PathBuf> {
    let timestamp = record.started_at.format("%Y-%m-%dT%H-%M-%SZ");
    let path = drops_dir.join(format!("{timestamp}__drop_{}.json", record.drop_id));
    write_json_atomic(&path, record)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_named_after_start_time_and_id() {
        let dir = std::env::temp_dir().join(format!("pipedrop_audit_{}", uuid::Uuid::new_v4()));
        let started_at = DateTime::parse_from_rfc3339("2024-03-01T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = DropRecord {
            drop_id: "abc".to_string(),
            pipeline_name: "shop".to_string(),
            started_at,
            finished_at: started_at,
            status: DropStatus::DryRun,
            request: DropRequest::resources(["users"]),
            destination: None,
            info: None,
            error: None,
        };

        let path = write_drop_record(&dir, &record).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-03-01T10-20-30Z__drop_abc.json"
        );
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["status"], "DRY_RUN");
        assert_eq!(written["request"]["resources"][0], "users");

        let rewritten = DropRecord {
            status: DropStatus::Ok,
            ..record
        };
        assert_eq!(write_drop_record(&dir, &rewritten).unwrap(), path);
        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2024-03-01T10-20-30Z__drop_abc.json"]);
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["status"], "OK");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
