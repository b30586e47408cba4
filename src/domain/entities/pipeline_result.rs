use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::CorrectionLog;
use crate::domain::value_objects::{TargetGrammar, Verdict};

/// Final outcome for one question. The pipeline emits exactly one of
/// these per input question, even when generation fails outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    question_id: Uuid,
    db_id: String,
    final_program: String,
    grammar: TargetGrammar,
    attempts_used: u32,
    verdict: Verdict,
    /// Skip reason for questions that never reached correction
    /// (generation produced zero candidates, unknown database, ...).
    skip_reason: Option<String>,
    log: CorrectionLog,
}

impl PipelineResult {
    pub fn new(
        db_id: impl Into<String>,
        final_program: impl Into<String>,
        grammar: TargetGrammar,
        verdict: Verdict,
        log: CorrectionLog,
    ) -> Self {
        let attempts_used = log.len() as u32;
        Self {
            question_id: log.question_id(),
            db_id: db_id.into(),
            final_program: final_program.into(),
            grammar,
            attempts_used,
            verdict,
            skip_reason: None,
            log,
        }
    }

    /// A result for a question that terminated before correction could
    /// run. The program is empty and the verdict invalid.
    pub fn skipped(
        question_id: Uuid,
        db_id: impl Into<String>,
        grammar: TargetGrammar,
        reason: impl Into<String>,
    ) -> Self {
        let db_id = db_id.into();
        Self {
            question_id,
            db_id: db_id.clone(),
            final_program: String::new(),
            grammar,
            attempts_used: 0,
            verdict: Verdict::Invalid,
            skip_reason: Some(reason.into()),
            log: CorrectionLog::new(question_id, db_id),
        }
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    pub fn final_program(&self) -> &str {
        &self.final_program
    }

    pub fn grammar(&self) -> TargetGrammar {
        self.grammar
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn log(&self) -> &CorrectionLog {
        &self.log
    }
}
