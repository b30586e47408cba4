use std::path::PathBuf;

use dotenv::dotenv;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use text2sql::application::services::Question;
use text2sql::config::PipelineConfig;
use text2sql::infrastructure::container::AppContainer;

/// One entry of a Spider-style dataset file.
#[derive(Deserialize)]
struct DatasetEntry {
    question: String,
    db_id: String,
    #[serde(default)]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dataset_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var("T2S_DATASET").ok().map(PathBuf::from))
        .ok_or("usage: text2sql <dataset.json>")?;

    let config = PipelineConfig::from_env()?;
    let container = AppContainer::new(&config)?;

    let raw = std::fs::read_to_string(&dataset_path)?;
    let entries: Vec<DatasetEntry> = serde_json::from_str(&raw)?;
    let questions: Vec<Question> = entries
        .into_iter()
        .map(|entry| {
            let question = Question::new(entry.db_id, entry.question);
            match entry.query {
                Some(gold) => question.with_gold_program(gold),
                None => question,
            }
        })
        .collect();
    info!(questions = questions.len(), path = %dataset_path.display(), "dataset loaded");

    let results = container.pipeline.run_batch(&questions).await;

    std::fs::create_dir_all(&config.log_dir)?;
    let predictions_path = config
        .log_dir
        .join(format!("predictions_{}.txt", container.run_id));
    let mut lines: String = results
        .iter()
        .map(|result| result.final_program())
        .collect::<Vec<_>>()
        .join("\n");
    lines.push('\n');
    std::fs::write(&predictions_path, lines)?;
    info!(path = %predictions_path.display(), "predictions written");

    if questions.iter().any(|q| q.gold_program.is_some()) {
        let report = container.harness.evaluate(&questions, &results).await;
        let metrics_path = config
            .log_dir
            .join(format!("metrics_{}.json", container.run_id));
        std::fs::write(&metrics_path, serde_json::to_string_pretty(&report)?)?;
        info!(
            exact_match = report.exact_match_accuracy,
            execution = report.execution_accuracy,
            path = %metrics_path.display(),
            "evaluation finished"
        );
    }

    Ok(())
}
