use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::correction_log_store::{CorrectionLogRecord, CorrectionLogStore};
use crate::application::ports::correction_oracle::{CorrectionOracle, CorrectionRequest, OracleError};
use crate::application::ports::query_executor::{ProbeErrorClass, ProbeOutcome, QueryExecutor};
use crate::domain::entities::{AttemptStatus, Candidate, CorrectionAttempt, CorrectionLog};
use crate::domain::value_objects::Verdict;

/// Tunables of the correction loop.
#[derive(Debug, Clone)]
pub struct CorrectionPolicy {
    /// Correction rounds per question; the retry budget.
    pub max_attempts: u32,
    /// Candidates below this generator confidence enter correction even
    /// when they validate.
    pub confidence_threshold: f64,
    /// Independent timeout for each oracle call.
    pub attempt_timeout: Duration,
    /// Exponential backoff between rounds: `base * factor^(n-2)` before
    /// round `n`, none before the first.
    pub backoff_base: Duration,
    pub backoff_factor: f64,
}

/// Final outcome of the correction loop for one question.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub final_program: String,
    pub verdict: Verdict,
    pub log: CorrectionLog,
}

/// Correction loop state machine: `Validating` splits into
/// `Accepted` or `NeedsCorrection`, `Correcting` issues one oracle call
/// and loops back through `Validating`, until `Accepted` or the retry
/// budget is spent (`Exhausted`). Timeouts and transport failures are
/// ordinary transitions, not exceptions.
enum ControllerState {
    Validating {
        program: String,
        oracle_step: Option<OracleStep>,
    },
    NeedsCorrection {
        program: String,
        diagnostic: String,
    },
    Correcting {
        program: String,
        diagnostic: String,
    },
    Accepted {
        program: String,
    },
    Exhausted {
        program: String,
    },
}

/// Bookkeeping carried from `Correcting` into the re-validation step.
struct OracleStep {
    submitted_program: String,
    raw_response: String,
    latency_ms: u64,
}

pub struct CorrectionController {
    oracle: Arc<dyn CorrectionOracle>,
    executor: Arc<dyn QueryExecutor>,
    log_store: Arc<dyn CorrectionLogStore>,
    policy: CorrectionPolicy,
    run_id: Uuid,
}

impl CorrectionController {
    pub fn new(
        oracle: Arc<dyn CorrectionOracle>,
        executor: Arc<dyn QueryExecutor>,
        log_store: Arc<dyn CorrectionLogStore>,
        policy: CorrectionPolicy,
        run_id: Uuid,
    ) -> Self {
        Self {
            oracle,
            executor,
            log_store,
            policy,
            run_id,
        }
    }

    /// Run the correction loop for one question's ranked candidates.
    /// Never fails: oracle outages degrade to the best program seen.
    pub async fn correct(
        &self,
        question_id: Uuid,
        db_id: &str,
        question: &str,
        schema_skeleton: &str,
        candidates: &[Candidate],
    ) -> CorrectionOutcome {
        let mut log = CorrectionLog::new(question_id, db_id);

        let Some(best) = candidates.first() else {
            return CorrectionOutcome {
                final_program: String::new(),
                verdict: Verdict::Invalid,
                log,
            };
        };

        let initial_program = best.text().to_string();
        let mut initial_valid = false;
        let mut attempts_used: u32 = 0;

        let mut state = ControllerState::Validating {
            program: initial_program.clone(),
            oracle_step: None,
        };

        loop {
            state = match state {
                ControllerState::Validating {
                    program,
                    oracle_step,
                } => {
                    let probe = self.executor.probe(db_id, &program).await;
                    match oracle_step {
                        None => {
                            initial_valid = probe.success;
                            if probe.success
                                && best.confidence() >= self.policy.confidence_threshold
                            {
                                ControllerState::Accepted { program }
                            } else {
                                let diagnostic = if probe.success {
                                    low_confidence_hint(best.confidence())
                                } else {
                                    guided_hint(&probe)
                                };
                                debug!(
                                    question_id = %question_id,
                                    valid = probe.success,
                                    confidence = best.confidence(),
                                    "initial candidate needs correction"
                                );
                                ControllerState::NeedsCorrection {
                                    program,
                                    diagnostic,
                                }
                            }
                        }
                        Some(step) => {
                            if probe.success {
                                // Both valid: prefer the correction unless it
                                // ballooned past the length guard.
                                let oversized = initial_valid
                                    && program.len() as f64
                                        > initial_program.len() as f64 * 1.2;
                                if oversized {
                                    self.record(
                                        &mut log,
                                        CorrectionAttempt {
                                            index: attempts_used,
                                            submitted_program: step.submitted_program,
                                            oracle_response: Some(step.raw_response),
                                            corrected_program: Some(program),
                                            verdict: Verdict::Valid,
                                            status: AttemptStatus::Superseded,
                                            latency_ms: step.latency_ms,
                                        },
                                    )
                                    .await;
                                    ControllerState::Accepted {
                                        program: initial_program.clone(),
                                    }
                                } else {
                                    self.record(
                                        &mut log,
                                        CorrectionAttempt {
                                            index: attempts_used,
                                            submitted_program: step.submitted_program,
                                            oracle_response: Some(step.raw_response),
                                            corrected_program: Some(program.clone()),
                                            verdict: Verdict::Valid,
                                            status: AttemptStatus::Validated,
                                            latency_ms: step.latency_ms,
                                        },
                                    )
                                    .await;
                                    ControllerState::Accepted { program }
                                }
                            } else {
                                let diagnostic = guided_hint(&probe);
                                self.record(
                                    &mut log,
                                    CorrectionAttempt {
                                        index: attempts_used,
                                        submitted_program: step.submitted_program,
                                        oracle_response: Some(step.raw_response),
                                        corrected_program: Some(program.clone()),
                                        verdict: Verdict::Invalid,
                                        status: AttemptStatus::Rejected(diagnostic.clone()),
                                        latency_ms: step.latency_ms,
                                    },
                                )
                                .await;
                                ControllerState::NeedsCorrection {
                                    program,
                                    diagnostic,
                                }
                            }
                        }
                    }
                }

                ControllerState::NeedsCorrection {
                    program,
                    diagnostic,
                } => {
                    if attempts_used >= self.policy.max_attempts {
                        ControllerState::Exhausted { program }
                    } else {
                        ControllerState::Correcting {
                            program,
                            diagnostic,
                        }
                    }
                }

                ControllerState::Correcting {
                    program,
                    diagnostic,
                } => {
                    attempts_used += 1;
                    if attempts_used > 1 {
                        tokio::time::sleep(self.backoff_delay(attempts_used)).await;
                    }

                    let request = CorrectionRequest {
                        question: question.to_string(),
                        schema_skeleton: schema_skeleton.to_string(),
                        program: program.clone(),
                        diagnostic: diagnostic.clone(),
                    };

                    let started = Instant::now();
                    let outcome = tokio::time::timeout(
                        self.policy.attempt_timeout,
                        self.oracle.request_correction(&request),
                    )
                    .await
                    .unwrap_or(Err(OracleError::Timeout));
                    let latency_ms = started.elapsed().as_millis() as u64;

                    match outcome {
                        Ok(response) => match response.program {
                            Some(corrected) => ControllerState::Validating {
                                program: corrected,
                                oracle_step: Some(OracleStep {
                                    submitted_program: program,
                                    raw_response: response.raw,
                                    latency_ms,
                                }),
                            },
                            None => {
                                self.record(
                                    &mut log,
                                    CorrectionAttempt {
                                        index: attempts_used,
                                        submitted_program: program.clone(),
                                        oracle_response: Some(response.raw),
                                        corrected_program: None,
                                        verdict: Verdict::Invalid,
                                        status: AttemptStatus::Unparseable,
                                        latency_ms,
                                    },
                                )
                                .await;
                                ControllerState::NeedsCorrection {
                                    program,
                                    diagnostic,
                                }
                            }
                        },
                        Err(error) => {
                            let status = match &error {
                                OracleError::Timeout => AttemptStatus::Timeout,
                                other => AttemptStatus::Transport(other.to_string()),
                            };
                            warn!(
                                question_id = %question_id,
                                attempt = attempts_used,
                                %error,
                                "oracle call failed"
                            );
                            self.record(
                                &mut log,
                                CorrectionAttempt {
                                    index: attempts_used,
                                    submitted_program: program.clone(),
                                    oracle_response: None,
                                    corrected_program: None,
                                    verdict: Verdict::Invalid,
                                    status,
                                    latency_ms,
                                },
                            )
                            .await;
                            ControllerState::NeedsCorrection {
                                program,
                                diagnostic,
                            }
                        }
                    }
                }

                ControllerState::Accepted { program } => {
                    return CorrectionOutcome {
                        final_program: program,
                        verdict: Verdict::Valid,
                        log,
                    };
                }

                ControllerState::Exhausted { program } => {
                    // Fall back to the best validated program seen: the
                    // initial candidate when it validated (it only lands
                    // here through the low-confidence path), otherwise the
                    // last-seen program, marked invalid.
                    let (final_program, verdict) = if initial_valid {
                        (initial_program.clone(), Verdict::Valid)
                    } else {
                        (program, Verdict::Invalid)
                    };
                    debug!(
                        question_id = %question_id,
                        attempts = attempts_used,
                        verdict = %verdict,
                        "correction budget exhausted"
                    );
                    return CorrectionOutcome {
                        final_program,
                        verdict,
                        log,
                    };
                }
            };
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self.policy.backoff_factor.powi(attempt.saturating_sub(2) as i32);
        self.policy.backoff_base.mul_f64(factor.max(0.0))
    }

    async fn record(&self, log: &mut CorrectionLog, attempt: CorrectionAttempt) {
        let record = CorrectionLogRecord::from_attempt(
            self.run_id,
            log.question_id(),
            log.db_id(),
            &attempt,
        );
        if let Err(error) = self.log_store.append(&record).await {
            warn!(%error, "failed to persist correction attempt");
        }
        log.push(attempt);
    }
}

/// Targeted, minimal-change hint derived from the probe error class.
fn guided_hint(probe: &ProbeOutcome) -> String {
    match probe.error_class {
        Some(ProbeErrorClass::Syntax) => {
            "Fix the SQL syntax error only. Do not change table or column names unless necessary."
                .to_string()
        }
        Some(ProbeErrorClass::UnknownSchemaItem) => {
            "Fix the table/column name error only. Check the schema carefully.".to_string()
        }
        Some(ProbeErrorClass::AmbiguousColumn) => {
            "Fix the ambiguous column reference by adding a table alias.".to_string()
        }
        _ => match &probe.error {
            Some(error) => {
                let snippet: String = error.chars().take(100).collect();
                format!("Fix this specific error: {}. Make minimal changes.", snippet)
            }
            None => "Fix any execution errors, but make minimal changes to the SQL structure."
                .to_string(),
        },
    }
}

fn low_confidence_hint(confidence: f64) -> String {
    format!(
        "The query executes but generator confidence is low ({:.3}). \
         Review and improve the SQL if possible, but be conservative.",
        confidence
    )
}
