use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Verdict;

/// How one correction round ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The oracle's program passed the validation probe.
    Validated,
    /// The oracle's program failed the probe; carries the diagnostic.
    Rejected(String),
    /// The oracle program validated but was discarded in favor of an
    /// already-valid initial program (length guard).
    Superseded,
    /// The response contained no extractable program.
    Unparseable,
    /// The call exceeded its per-attempt timeout.
    Timeout,
    /// Network-level failure, including a refused rate-limit slot.
    Transport(String),
}

impl AttemptStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptStatus::Timeout | AttemptStatus::Transport(_))
    }
}

/// Audit record of one correction round. Appended once per oracle call
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionAttempt {
    pub index: u32,
    pub submitted_program: String,
    pub oracle_response: Option<String>,
    pub corrected_program: Option<String>,
    pub verdict: Verdict,
    pub status: AttemptStatus,
    pub latency_ms: u64,
}

/// The ordered sequence of correction attempts for one question. Present
/// even when empty (the clean-accept case); the log is a required output
/// of every pipeline run, not optional telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionLog {
    question_id: Uuid,
    db_id: String,
    attempts: Vec<CorrectionAttempt>,
}

impl CorrectionLog {
    pub fn new(question_id: Uuid, db_id: impl Into<String>) -> Self {
        Self {
            question_id,
            db_id: db_id.into(),
            attempts: Vec::new(),
        }
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    pub fn attempts(&self) -> &[CorrectionAttempt] {
        &self.attempts
    }

    pub fn push(&mut self, attempt: CorrectionAttempt) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
