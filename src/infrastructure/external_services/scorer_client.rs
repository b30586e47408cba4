use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::relevance_scorer::{RelevanceScorer, ScorerError};
use crate::domain::entities::{SchemaItem, SchemaItemKind, ScoredSchemaItem};
use crate::domain::value_objects::ScoringStrategy;

/// Manifest describing a deployed relevance-scoring model. Lives next to
/// the model weights and is loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerArtifact {
    pub model_id: String,
    pub endpoint: String,
    pub supported_strategies: Vec<ScoringStrategy>,
}

impl ScorerArtifact {
    pub fn load(path: &Path) -> Result<Self, ScorerError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            ScorerError::Configuration(format!(
                "cannot read scorer artifact {}: {}",
                path.display(),
                error
            ))
        })?;
        let artifact: ScorerArtifact = serde_json::from_str(&raw).map_err(|error| {
            ScorerError::Configuration(format!(
                "malformed scorer artifact {}: {}",
                path.display(),
                error
            ))
        })?;
        if artifact.supported_strategies.is_empty() {
            return Err(ScorerError::Configuration(format!(
                "scorer artifact {} declares no strategies",
                artifact.model_id
            )));
        }
        Ok(artifact)
    }
}

#[derive(Debug, Clone)]
pub struct ScorerClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl Default for ScorerClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_factor: 1.5,
        }
    }
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    model_id: &'a str,
    question: &'a str,
    strategy: ScoringStrategy,
    items: Vec<ItemPayload<'a>>,
}

#[derive(Serialize)]
struct ItemPayload<'a> {
    identifier: &'a str,
    kind: &'a str,
    declared_type: Option<&'a str>,
    sample_tokens: &'a [String],
}

#[derive(Deserialize)]
struct ScoreResponse {
    probabilities: Vec<f64>,
}

/// Relevance scorer backed by a remote model runtime.
pub struct HttpRelevanceScorer {
    client: Client,
    artifact: ScorerArtifact,
    config: ScorerClientConfig,
}

impl HttpRelevanceScorer {
    pub fn new(artifact: ScorerArtifact, config: ScorerClientConfig) -> Result<Self, ScorerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| ScorerError::Configuration(error.to_string()))?;
        Ok(Self {
            client,
            artifact,
            config,
        })
    }

    async fn send_request(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse, ScorerError> {
        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;

            match self.execute_request(request).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    last_error = Some(error);

                    if attempts > self.config.max_retries {
                        break;
                    }

                    let backoff = Duration::from_millis(
                        (self.config.backoff_factor.powi(attempts as i32 - 1) * 1000.0) as u64,
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ScorerError::Inference("retry budget exhausted".to_string())))
    }

    async fn execute_request(
        &self,
        request: &ScoreRequest<'_>,
    ) -> Result<ScoreResponse, ScorerError> {
        let response = self
            .client
            .post(&self.artifact.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|error| ScorerError::Inference(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScorerError::Inference(format!("status {}", status)));
        }

        response
            .json::<ScoreResponse>()
            .await
            .map_err(|error| ScorerError::Inference(format!("malformed response: {}", error)))
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score(
        &self,
        question: &str,
        items: &[SchemaItem],
        strategy: ScoringStrategy,
    ) -> Result<Vec<ScoredSchemaItem>, ScorerError> {
        if !self.artifact.supported_strategies.contains(&strategy) {
            return Err(ScorerError::Configuration(format!(
                "artifact {} does not support strategy {}",
                self.artifact.model_id, strategy
            )));
        }

        let request = ScoreRequest {
            model_id: &self.artifact.model_id,
            question,
            strategy,
            items: items
                .iter()
                .map(|item| ItemPayload {
                    identifier: item.identifier(),
                    kind: match item.kind() {
                        SchemaItemKind::Table => "table",
                        SchemaItemKind::Column => "column",
                    },
                    declared_type: item.declared_type(),
                    sample_tokens: item.sample_tokens(),
                })
                .collect(),
        };

        let response = self.send_request(&request).await?;
        if response.probabilities.len() != items.len() {
            return Err(ScorerError::ShapeMismatch {
                expected: items.len(),
                got: response.probabilities.len(),
            });
        }

        debug!(
            items = items.len(),
            %strategy,
            "schema items scored"
        );

        Ok(items
            .iter()
            .zip(response.probabilities)
            .map(|(item, probability)| ScoredSchemaItem::new(item.clone(), probability, strategy))
            .collect())
    }

    fn supported_strategies(&self) -> &[ScoringStrategy] {
        &self.artifact.supported_strategies
    }
}
