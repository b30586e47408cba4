use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::program_generator::GenerationRequest;
use crate::application::ports::{ProgramGenerator, RelevanceScorer};
use crate::application::services::correction_controller::CorrectionController;
use crate::application::services::schema_pruner::SchemaPruner;
use crate::domain::entities::{rank_candidates, DatabaseSchema, PipelineResult};
use crate::domain::value_objects::ScoringStrategy;

/// One input question of a run.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub db_id: String,
    pub text: String,
    /// Reference program, when the dataset ships one.
    pub gold_program: Option<String>,
}

impl Question {
    pub fn new(db_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            db_id: db_id.into(),
            text: text.into(),
            gold_program: None,
        }
    }

    pub fn with_gold_program(mut self, program: impl Into<String>) -> Self {
        self.gold_program = Some(program.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub strategy: ScoringStrategy,
    pub beam_width: usize,
    pub num_return: usize,
    pub seed: Option<u64>,
    pub worker_count: usize,
}

/// Per-run counters, updated as questions complete.
#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    valid: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: u64,
    pub valid: u64,
    pub skipped: u64,
}

/// Runs score, prune, generate, correct end to end. A per-question
/// failure in any stage becomes a skipped result; it never takes the
/// batch down.
pub struct PipelineService {
    scorer: Arc<dyn RelevanceScorer>,
    pruner: SchemaPruner,
    generator: Arc<dyn ProgramGenerator>,
    controller: Arc<CorrectionController>,
    schemas: Arc<HashMap<String, DatabaseSchema>>,
    options: PipelineOptions,
    counters: Counters,
}

impl PipelineService {
    pub fn new(
        scorer: Arc<dyn RelevanceScorer>,
        pruner: SchemaPruner,
        generator: Arc<dyn ProgramGenerator>,
        controller: Arc<CorrectionController>,
        schemas: Arc<HashMap<String, DatabaseSchema>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            scorer,
            pruner,
            generator,
            controller,
            schemas,
            options,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            valid: self.counters.valid.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Process one question. Always returns a result; stage failures are
    /// folded into it as a skip reason.
    pub async fn run_question(&self, question: &Question) -> PipelineResult {
        let result = self.run_question_inner(question).await;

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        if result.verdict().is_valid() {
            self.counters.valid.fetch_add(1, Ordering::Relaxed);
        }
        if result.skip_reason().is_some() {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn run_question_inner(&self, question: &Question) -> PipelineResult {
        let grammar = self.generator.grammar();

        let Some(schema) = self.schemas.get(&question.db_id) else {
            warn!(db_id = %question.db_id, "unknown database, skipping question");
            return PipelineResult::skipped(
                question.id,
                &question.db_id,
                grammar,
                format!("unknown database '{}'", question.db_id),
            );
        };

        let scored = match self
            .scorer
            .score(&question.text, schema.items(), self.options.strategy)
            .await
        {
            Ok(scored) => scored,
            Err(error) => {
                warn!(question_id = %question.id, %error, "relevance scoring failed");
                return PipelineResult::skipped(
                    question.id,
                    &question.db_id,
                    grammar,
                    format!("scoring failed: {}", error),
                );
            }
        };

        let pruned = self.pruner.prune(&question.text, &scored);
        debug!(
            question_id = %question.id,
            tables = pruned.tables().len(),
            "schema pruned"
        );

        let request = GenerationRequest {
            pruned_input: pruned.clone(),
            beam_width: self.options.beam_width,
            num_return: self.options.num_return,
            seed: self.options.seed,
        };
        let candidates = match self.generator.generate(request).await {
            Ok(candidates) => rank_candidates(candidates),
            Err(error) => {
                warn!(question_id = %question.id, %error, "generation failed");
                return PipelineResult::skipped(
                    question.id,
                    &question.db_id,
                    grammar,
                    format!("generation failed: {}", error),
                );
            }
        };

        let outcome = self
            .controller
            .correct(
                question.id,
                &question.db_id,
                &question.text,
                pruned.skeleton(),
                &candidates,
            )
            .await;

        PipelineResult::new(
            &question.db_id,
            outcome.final_program,
            grammar,
            outcome.verdict,
            outcome.log,
        )
    }

    /// Process a batch with bounded concurrency. Output order matches
    /// input order regardless of completion order.
    pub async fn run_batch(&self, questions: &[Question]) -> Vec<PipelineResult> {
        let workers = self.options.worker_count.max(1);
        info!(questions = questions.len(), workers, "starting batch run");

        let mut indexed: Vec<(usize, PipelineResult)> = stream::iter(
            questions
                .iter()
                .enumerate()
                .map(|(index, question)| async move {
                    (index, self.run_question(question).await)
                }),
        )
        .buffer_unordered(workers)
        .collect()
        .await;

        indexed.sort_by_key(|(index, _)| *index);

        let stats = self.stats();
        info!(
            processed = stats.processed,
            valid = stats.valid,
            skipped = stats.skipped,
            "batch run finished"
        );

        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::correction_log_store::{CorrectionLogRecord, CorrectionLogStore};
    use crate::application::ports::correction_oracle::{
        CorrectionOracle, CorrectionRequest, CorrectionResponse, OracleError,
    };
    use crate::application::ports::program_generator::GeneratorError;
    use crate::application::ports::query_executor::{
        ExecutorError, ProbeOutcome, QueryExecutor,
    };
    use crate::application::ports::correction_log_store::LogStoreError;
    use crate::application::ports::relevance_scorer::ScorerError;
    use crate::application::services::correction_controller::CorrectionPolicy;
    use crate::domain::entities::{Candidate, SchemaItem, ScoredSchemaItem, TablesRecord};
    use crate::domain::value_objects::TargetGrammar;
    use async_trait::async_trait;
    use std::time::Duration;

    struct UniformScorer;

    #[async_trait]
    impl RelevanceScorer for UniformScorer {
        async fn score(
            &self,
            _question: &str,
            items: &[SchemaItem],
            strategy: ScoringStrategy,
        ) -> Result<Vec<ScoredSchemaItem>, ScorerError> {
            Ok(items
                .iter()
                .map(|item| ScoredSchemaItem::new(item.clone(), 0.9, strategy))
                .collect())
        }

        fn supported_strategies(&self) -> &[ScoringStrategy] {
            &[ScoringStrategy::Gated]
        }
    }

    /// Echoes the question back as a program, after a delay keyed on the
    /// question length so completion order differs from input order.
    struct EchoGenerator;

    #[async_trait]
    impl ProgramGenerator for EchoGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<Vec<Candidate>, GeneratorError> {
            let question = request.pruned_input.question().to_string();
            let delay = 40u64.saturating_sub(question.len() as u64 * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![Candidate::new(
                format!("SELECT '{}'", question),
                TargetGrammar::Sql,
                0.95,
                0,
            )])
        }

        fn grammar(&self) -> TargetGrammar {
            TargetGrammar::Sql
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ProgramGenerator for FailingGenerator {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<Vec<Candidate>, GeneratorError> {
            Err(GeneratorError::NoCandidates)
        }

        fn grammar(&self) -> TargetGrammar {
            TargetGrammar::Sql
        }
    }

    struct AcceptAllExecutor;

    #[async_trait]
    impl QueryExecutor for AcceptAllExecutor {
        async fn probe(&self, _db_id: &str, _program: &str) -> ProbeOutcome {
            ProbeOutcome::passed(Some(1), 1)
        }

        async fn execute(
            &self,
            _db_id: &str,
            _program: &str,
            _limit: usize,
        ) -> Result<Vec<Vec<String>>, ExecutorError> {
            Ok(Vec::new())
        }
    }

    struct SilentOracle;

    #[async_trait]
    impl CorrectionOracle for SilentOracle {
        async fn request_correction(
            &self,
            _request: &CorrectionRequest,
        ) -> Result<CorrectionResponse, OracleError> {
            Err(OracleError::Transport("unused in these tests".to_string()))
        }
    }

    struct NullLogStore;

    #[async_trait]
    impl CorrectionLogStore for NullLogStore {
        async fn append(&self, _record: &CorrectionLogRecord) -> Result<(), LogStoreError> {
            Ok(())
        }
    }

    fn test_schema() -> DatabaseSchema {
        let record: TablesRecord = serde_json::from_value(serde_json::json!({
            "db_id": "concert_singer",
            "table_names_original": ["stadium", "singer"],
            "column_names_original": [
                [-1, "*"],
                [0, "stadium_id"],
                [0, "name"],
                [1, "singer_id"],
                [1, "name"]
            ],
            "column_types": ["text", "number", "text", "number", "text"],
            "primary_keys": [1, 3],
            "foreign_keys": []
        }))
        .unwrap();
        DatabaseSchema::from_record(&record)
    }

    fn test_pipeline(
        generator: Arc<dyn ProgramGenerator>,
        worker_count: usize,
    ) -> PipelineService {
        let controller = Arc::new(CorrectionController::new(
            Arc::new(SilentOracle),
            Arc::new(AcceptAllExecutor),
            Arc::new(NullLogStore),
            CorrectionPolicy {
                max_attempts: 2,
                confidence_threshold: 0.5,
                attempt_timeout: Duration::from_millis(100),
                backoff_base: Duration::ZERO,
                backoff_factor: 2.0,
            },
            Uuid::new_v4(),
        ));
        let mut schemas = HashMap::new();
        let schema = test_schema();
        schemas.insert(schema.db_id().to_string(), schema);

        PipelineService::new(
            Arc::new(UniformScorer),
            SchemaPruner::new(4, 5),
            generator,
            controller,
            Arc::new(schemas),
            PipelineOptions {
                strategy: ScoringStrategy::Gated,
                beam_width: 8,
                num_return: 8,
                seed: Some(42),
                worker_count,
            },
        )
    }

    #[tokio::test]
    async fn test_single_question_happy_path() {
        let pipeline = test_pipeline(Arc::new(EchoGenerator), 1);
        let question = Question::new("concert_singer", "How many singers?");

        let result = pipeline.run_question(&question).await;

        assert!(result.verdict().is_valid());
        assert_eq!(result.final_program(), "SELECT 'How many singers?'");
        assert_eq!(result.attempts_used(), 0);
        assert!(result.skip_reason().is_none());
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let pipeline = test_pipeline(Arc::new(EchoGenerator), 4);
        let questions: Vec<Question> = ["a", "ab", "abc", "abcd", "abcde", "abcdef"]
            .iter()
            .map(|text| Question::new("concert_singer", *text))
            .collect();

        let results = pipeline.run_batch(&questions).await;

        assert_eq!(results.len(), questions.len());
        for (question, result) in questions.iter().zip(&results) {
            assert_eq!(result.question_id(), question.id);
            assert_eq!(
                result.final_program(),
                format!("SELECT '{}'", question.text)
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_database_is_skipped_not_fatal() {
        let pipeline = test_pipeline(Arc::new(EchoGenerator), 2);
        let questions = vec![
            Question::new("concert_singer", "How many singers?"),
            Question::new("no_such_db", "How many rows?"),
            Question::new("concert_singer", "List singer names"),
        ];

        let results = pipeline.run_batch(&questions).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].skip_reason().is_none());
        assert!(results[1].skip_reason().unwrap().contains("no_such_db"));
        assert!(!results[1].verdict().is_valid());
        assert!(results[2].skip_reason().is_none());

        let stats = pipeline.stats();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.valid, 2);
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_skip() {
        let pipeline = test_pipeline(Arc::new(FailingGenerator), 1);
        let question = Question::new("concert_singer", "How many singers?");

        let result = pipeline.run_question(&question).await;

        assert!(!result.verdict().is_valid());
        assert!(result.skip_reason().unwrap().contains("generation failed"));
        assert_eq!(result.final_program(), "");
    }
}
