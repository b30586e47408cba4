use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::application::ports::QueryExecutor;
use crate::application::services::pipeline::Question;
use crate::domain::entities::PipelineResult;
use crate::domain::value_objects::Hardness;
use crate::evaluation::metrics::{exact_match, result_sets_match};

const RESULT_ROW_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub total: usize,
    pub exact_matches: usize,
    pub execution_matches: usize,
}

impl BucketStats {
    fn record(&mut self, exact: bool, execution: bool) {
        self.total += 1;
        if exact {
            self.exact_matches += 1;
        }
        if execution {
            self.execution_matches += 1;
        }
    }
}

/// Accuracy report over one run, broken down by gold-program hardness.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub scored: usize,
    pub exact_matches: usize,
    pub execution_matches: usize,
    pub exact_match_accuracy: f64,
    pub execution_accuracy: f64,
    pub by_hardness: BTreeMap<String, BucketStats>,
}

/// Scores a finished run against gold programs: exact match on the
/// normalized text, execution accuracy on compared result sets.
/// Questions without a gold program are counted but not scored.
pub struct EvaluationHarness {
    executor: Arc<dyn QueryExecutor>,
}

impl EvaluationHarness {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn evaluate(
        &self,
        questions: &[Question],
        results: &[PipelineResult],
    ) -> EvaluationReport {
        let mut scored = 0usize;
        let mut exact_matches = 0usize;
        let mut execution_matches = 0usize;
        let mut by_hardness: BTreeMap<String, BucketStats> = BTreeMap::new();

        for (question, result) in questions.iter().zip(results) {
            let Some(gold) = question.gold_program.as_deref() else {
                continue;
            };
            scored += 1;

            let exact = exact_match(result.final_program(), gold);
            let execution = self
                .execution_matches(&question.db_id, result.final_program(), gold)
                .await;

            if exact {
                exact_matches += 1;
            }
            if execution {
                execution_matches += 1;
            }

            let hardness = Hardness::classify(gold);
            by_hardness
                .entry(hardness.as_str().to_string())
                .or_default()
                .record(exact, execution);

            debug!(
                question_id = %question.id,
                %hardness,
                exact,
                execution,
                "question evaluated"
            );
        }

        let ratio = |matches: usize| {
            if scored == 0 {
                0.0
            } else {
                matches as f64 / scored as f64
            }
        };

        EvaluationReport {
            total: questions.len(),
            scored,
            exact_matches,
            execution_matches,
            exact_match_accuracy: ratio(exact_matches),
            execution_accuracy: ratio(execution_matches),
            by_hardness,
        }
    }

    async fn execution_matches(&self, db_id: &str, predicted: &str, gold: &str) -> bool {
        if predicted.trim().is_empty() {
            return false;
        }

        let gold_rows = match self.executor.execute(db_id, gold, RESULT_ROW_LIMIT).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(db_id, %error, "gold program failed to execute");
                return false;
            }
        };
        let predicted_rows = match self
            .executor
            .execute(db_id, predicted, RESULT_ROW_LIMIT)
            .await
        {
            Ok(rows) => rows,
            Err(_) => return false,
        };

        result_sets_match(predicted_rows, gold_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::query_executor::{
        ExecutorError, ProbeOutcome, QueryExecutor,
    };
    use crate::domain::entities::CorrectionLog;
    use crate::domain::value_objects::{TargetGrammar, Verdict};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Maps whole programs to canned result sets.
    struct TableExecutor {
        results: HashMap<String, Vec<Vec<String>>>,
    }

    #[async_trait]
    impl QueryExecutor for TableExecutor {
        async fn probe(&self, _db_id: &str, _program: &str) -> ProbeOutcome {
            ProbeOutcome::passed(None, 0)
        }

        async fn execute(
            &self,
            _db_id: &str,
            program: &str,
            _limit: usize,
        ) -> Result<Vec<Vec<String>>, ExecutorError> {
            self.results
                .get(program)
                .cloned()
                .ok_or_else(|| ExecutorError::Execution("no such fixture".to_string()))
        }
    }

    fn result_for(question: &Question, program: &str) -> PipelineResult {
        PipelineResult::new(
            &question.db_id,
            program,
            TargetGrammar::Sql,
            Verdict::Valid,
            CorrectionLog::new(question.id, &question.db_id),
        )
    }

    #[tokio::test]
    async fn test_counts_exact_and_execution_matches() {
        let gold = "SELECT name FROM singer";
        let predicted = "select  name from singer;";
        let mut results = HashMap::new();
        results.insert(gold.to_string(), vec![vec!["Joe".to_string()]]);
        results.insert(predicted.to_string(), vec![vec!["Joe".to_string()]]);

        let harness = EvaluationHarness::new(Arc::new(TableExecutor { results }));
        let question = Question::new("db", "names?").with_gold_program(gold);
        let run_results = vec![result_for(&question, predicted)];

        let report = harness.evaluate(&[question], &run_results).await;

        assert_eq!(report.scored, 1);
        assert_eq!(report.exact_matches, 1);
        assert_eq!(report.execution_matches, 1);
        assert_eq!(report.exact_match_accuracy, 1.0);
    }

    #[tokio::test]
    async fn test_execution_match_without_exact_match() {
        // Different text, same result set.
        let gold = "SELECT name FROM singer WHERE age > 30";
        let predicted = "SELECT name FROM singer WHERE age >= 31";
        let rows = vec![vec!["Joe".to_string()], vec!["Ann".to_string()]];
        let mut results = HashMap::new();
        results.insert(gold.to_string(), rows.clone());
        let mut reordered = rows.clone();
        reordered.reverse();
        results.insert(predicted.to_string(), reordered);

        let harness = EvaluationHarness::new(Arc::new(TableExecutor { results }));
        let question = Question::new("db", "older singers?").with_gold_program(gold);
        let run_results = vec![result_for(&question, predicted)];

        let report = harness.evaluate(&[question], &run_results).await;

        assert_eq!(report.exact_matches, 0);
        assert_eq!(report.execution_matches, 1);
    }

    #[tokio::test]
    async fn test_questions_without_gold_are_not_scored() {
        let harness = EvaluationHarness::new(Arc::new(TableExecutor {
            results: HashMap::new(),
        }));
        let question = Question::new("db", "anything");
        let run_results = vec![result_for(&question, "SELECT 1 FROM t")];

        let report = harness.evaluate(&[question], &run_results).await;

        assert_eq!(report.total, 1);
        assert_eq!(report.scored, 0);
        assert_eq!(report.exact_match_accuracy, 0.0);
    }

    #[tokio::test]
    async fn test_hardness_buckets_are_populated() {
        let easy_gold = "SELECT name FROM singer";
        let medium_gold =
            "SELECT count(*) FROM singer JOIN concert ON singer.id = concert.singer_id";
        let mut results = HashMap::new();
        results.insert(easy_gold.to_string(), vec![vec!["Joe".to_string()]]);
        results.insert(medium_gold.to_string(), vec![vec!["2".to_string()]]);

        let harness = EvaluationHarness::new(Arc::new(TableExecutor { results }));
        let questions = vec![
            Question::new("db", "names?").with_gold_program(easy_gold),
            Question::new("db", "how many?").with_gold_program(medium_gold),
        ];
        let run_results = vec![
            result_for(&questions[0], easy_gold),
            result_for(&questions[1], medium_gold),
        ];

        let report = harness.evaluate(&questions, &run_results).await;

        assert_eq!(report.by_hardness.len(), 2);
        let easy = &report.by_hardness[Hardness::classify(easy_gold).as_str()];
        assert_eq!(easy.total, 1);
        assert_eq!(easy.exact_matches, 1);
    }

    #[tokio::test]
    async fn test_empty_prediction_scores_zero() {
        let gold = "SELECT name FROM singer";
        let mut results = HashMap::new();
        results.insert(gold.to_string(), vec![vec!["Joe".to_string()]]);

        let harness = EvaluationHarness::new(Arc::new(TableExecutor { results }));
        let question = Question::new("db", "names?").with_gold_program(gold);
        let run_results = vec![result_for(&question, "")];

        let report = harness.evaluate(&[question], &run_results).await;

        assert_eq!(report.exact_matches, 0);
        assert_eq!(report.execution_matches, 0);
    }
}
