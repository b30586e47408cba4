use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{AttemptStatus, CorrectionAttempt};
use crate::domain::value_objects::Verdict;

#[derive(Debug)]
pub enum LogStoreError {
    Io(String),
    Serialization(String),
}

impl std::fmt::Display for LogStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStoreError::Io(msg) => write!(f, "Log store I/O error: {}", msg),
            LogStoreError::Serialization(msg) => {
                write!(f, "Log store serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for LogStoreError {}

/// One persisted line of the per-run correction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionLogRecord {
    pub run_id: Uuid,
    pub question_id: Uuid,
    pub db_id: String,
    pub attempt_index: u32,
    pub input_program: String,
    pub oracle_response: Option<String>,
    pub corrected_program: Option<String>,
    pub verdict: Verdict,
    pub status: AttemptStatus,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl CorrectionLogRecord {
    pub fn from_attempt(
        run_id: Uuid,
        question_id: Uuid,
        db_id: &str,
        attempt: &CorrectionAttempt,
    ) -> Self {
        Self {
            run_id,
            question_id,
            db_id: db_id.to_string(),
            attempt_index: attempt.index,
            input_program: attempt.submitted_program.clone(),
            oracle_response: attempt.oracle_response.clone(),
            corrected_program: attempt.corrected_program.clone(),
            verdict: attempt.verdict.clone(),
            status: attempt.status.clone(),
            latency_ms: attempt.latency_ms,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only persistence for correction attempts; one store per
/// pipeline run, consumed by offline analysis tooling.
#[async_trait]
pub trait CorrectionLogStore: Send + Sync {
    async fn append(&self, record: &CorrectionLogRecord) -> Result<(), LogStoreError>;
}
