use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::application::ports::correction_log_store::{
    CorrectionLogRecord, CorrectionLogStore, LogStoreError,
};

/// First line of every log file: identifies the run and the exact
/// configuration it ran under.
#[derive(Debug, Serialize)]
struct RunHeader<'a> {
    record: &'static str,
    run_id: Uuid,
    config_fingerprint: &'a str,
    started_at: chrono::DateTime<Utc>,
}

/// Append-only correction log, one JSON record per line, one file per
/// run. Concurrent workers funnel through a mutex so records never
/// interleave mid-line.
pub struct JsonlCorrectionLogStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlCorrectionLogStore {
    pub fn create(
        log_dir: &Path,
        run_id: Uuid,
        config_fingerprint: &str,
    ) -> Result<Self, LogStoreError> {
        std::fs::create_dir_all(log_dir)
            .map_err(|error| LogStoreError::Io(error.to_string()))?;

        let path = log_dir.join(format!("correction_log_{}.jsonl", run_id));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| LogStoreError::Io(error.to_string()))?;

        let header = RunHeader {
            record: "run_header",
            run_id,
            config_fingerprint,
            started_at: Utc::now(),
        };
        let line = serde_json::to_string(&header)
            .map_err(|error| LogStoreError::Serialization(error.to_string()))?;
        writeln!(file, "{}", line).map_err(|error| LogStoreError::Io(error.to_string()))?;

        info!(path = %path.display(), "correction log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CorrectionLogStore for JsonlCorrectionLogStore {
    async fn append(&self, record: &CorrectionLogRecord) -> Result<(), LogStoreError> {
        let line = serde_json::to_string(record)
            .map_err(|error| LogStoreError::Serialization(error.to_string()))?;

        let mut file = self.file.lock().await;
        writeln!(file, "{}", line).map_err(|error| LogStoreError::Io(error.to_string()))?;
        file.flush()
            .map_err(|error| LogStoreError::Io(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AttemptStatus, CorrectionAttempt};
    use crate::domain::value_objects::Verdict;
    use tempfile::TempDir;

    fn sample_record(run_id: Uuid, index: u32) -> CorrectionLogRecord {
        CorrectionLogRecord::from_attempt(
            run_id,
            Uuid::new_v4(),
            "concert_singer",
            &CorrectionAttempt {
                index,
                submitted_program: "SELECT count(*) FROM singers".to_string(),
                oracle_response: Some("Corrected SQL: SELECT count(*) FROM singer".to_string()),
                corrected_program: Some("SELECT count(*) FROM singer".to_string()),
                verdict: Verdict::Valid,
                status: AttemptStatus::Validated,
                latency_ms: 840,
            },
        )
    }

    #[tokio::test]
    async fn test_appends_header_then_records() {
        let dir = TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let store = JsonlCorrectionLogStore::create(dir.path(), run_id, "abc123").unwrap();

        store.append(&sample_record(run_id, 1)).await.unwrap();
        store.append(&sample_record(run_id, 2)).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["record"], "run_header");
        assert_eq!(header["config_fingerprint"], "abc123");

        let first: CorrectionLogRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first.attempt_index, 1);
        assert_eq!(first.run_id, run_id);
        let second: CorrectionLogRecord = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(second.attempt_index, 2);
    }
}
