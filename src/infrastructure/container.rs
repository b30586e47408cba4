use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        ports::{CorrectionLogStore, CorrectionOracle, ProgramGenerator, QueryExecutor, RelevanceScorer},
        services::{CorrectionController, CorrectionPolicy, PipelineOptions, PipelineService, SchemaPruner},
    },
    config::PipelineConfig,
    domain::entities::{DatabaseSchema, TablesRecord},
    evaluation::EvaluationHarness,
    infrastructure::{
        database::SqliteExecutor,
        external_services::{
            GeneratorArtifact, GeneratorClientConfig, HttpCorrectionOracle, HttpProgramGenerator,
            HttpRelevanceScorer, OracleClientConfig, ScorerArtifact, ScorerClientConfig,
        },
        logging::JsonlCorrectionLogStore,
    },
};

/// Wires the whole pipeline together from one resolved configuration.
/// Construction fails fast on anything that would doom the run: missing
/// artifacts, an unsupported strategy, an unreadable schema file.
pub struct AppContainer {
    pub run_id: Uuid,
    pub executor: Arc<dyn QueryExecutor>,
    pub pipeline: Arc<PipelineService>,
    pub harness: EvaluationHarness,
}

impl AppContainer {
    pub fn new(config: &PipelineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let run_id = Uuid::new_v4();

        let schemas = Arc::new(load_schemas(&config.tables_path)?);
        info!(databases = schemas.len(), "schema catalog loaded");

        let scorer_artifact = ScorerArtifact::load(&config.scorer_artifact_path)?;
        if !scorer_artifact.supported_strategies.contains(&config.strategy) {
            return Err(format!(
                "scorer artifact {} does not support strategy {}",
                scorer_artifact.model_id, config.strategy
            )
            .into());
        }
        let scorer: Arc<dyn RelevanceScorer> = Arc::new(HttpRelevanceScorer::new(
            scorer_artifact,
            ScorerClientConfig::default(),
        )?);

        let generator_artifact = GeneratorArtifact::load(&config.generator_artifact_path)?;
        let generator: Arc<dyn ProgramGenerator> = Arc::new(HttpProgramGenerator::new(
            generator_artifact,
            GeneratorClientConfig::default(),
        )?);

        let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteExecutor::new(
            config.db_root.clone(),
            config.probe_timeout(),
        ));

        let oracle: Arc<dyn CorrectionOracle> = Arc::new(HttpCorrectionOracle::new(
            OracleClientConfig {
                endpoint: config.oracle.endpoint.clone(),
                api_key: config.oracle.api_key.clone(),
                model: config.oracle.model.clone(),
                temperature: config.oracle.temperature,
                max_tokens: config.oracle.max_tokens,
                timeout: Duration::from_secs(config.oracle.timeout_secs),
                requests_per_second: config.oracle.requests_per_second,
                max_queue_wait: Duration::from_secs(config.oracle.max_queue_wait_secs),
            },
        )?);

        let log_store: Arc<dyn CorrectionLogStore> = Arc::new(JsonlCorrectionLogStore::create(
            &config.log_dir,
            run_id,
            &config.fingerprint(),
        )?);

        let controller = Arc::new(CorrectionController::new(
            oracle,
            executor.clone(),
            log_store,
            CorrectionPolicy {
                max_attempts: config.max_attempts,
                confidence_threshold: config.confidence_threshold,
                attempt_timeout: Duration::from_secs(config.oracle.timeout_secs),
                backoff_base: Duration::from_millis(500),
                backoff_factor: 1.5,
            },
            run_id,
        ));

        let pipeline = Arc::new(PipelineService::new(
            scorer,
            SchemaPruner::new(config.k_table, config.k_column),
            generator,
            controller,
            schemas,
            PipelineOptions {
                strategy: config.strategy,
                beam_width: config.beam_width,
                num_return: config.num_return,
                seed: config.seed,
                worker_count: config.worker_count,
            },
        ));

        let harness = EvaluationHarness::new(executor.clone());

        info!(%run_id, strategy = %config.strategy, "pipeline assembled");
        Ok(Self {
            run_id,
            executor,
            pipeline,
            harness,
        })
    }
}

/// Load a Spider-style `tables.json` into a per-database schema map.
pub fn load_schemas(
    path: &Path,
) -> Result<HashMap<String, DatabaseSchema>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| format!("cannot read schema file {}: {}", path.display(), error))?;
    let records: Vec<TablesRecord> = serde_json::from_str(&raw)
        .map_err(|error| format!("malformed schema file {}: {}", path.display(), error))?;

    Ok(records
        .iter()
        .map(|record| {
            let schema = DatabaseSchema::from_record(record);
            (schema.db_id().to_string(), schema)
        })
        .collect())
}
