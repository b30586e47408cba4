use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::program_generator::{
    GenerationRequest, GeneratorError, ProgramGenerator,
};
use crate::domain::entities::{rank_candidates, Candidate};
use crate::domain::value_objects::TargetGrammar;

/// Manifest describing a deployed sequence-generation model, including
/// the grammar its decoder was trained to emit.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorArtifact {
    pub model_id: String,
    pub endpoint: String,
    pub grammar: TargetGrammar,
}

impl GeneratorArtifact {
    pub fn load(path: &Path) -> Result<Self, GeneratorError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            GeneratorError::Configuration(format!(
                "cannot read generator artifact {}: {}",
                path.display(),
                error
            ))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            GeneratorError::Configuration(format!(
                "malformed generator artifact {}: {}",
                path.display(),
                error
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl Default for GeneratorClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_factor: 1.5,
        }
    }
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    model_id: &'a str,
    question: &'a str,
    schema_skeleton: &'a str,
    beam_width: usize,
    num_return: usize,
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<CandidatePayload>,
}

#[derive(Deserialize)]
struct CandidatePayload {
    text: String,
    score: f64,
}

/// Beam-search generation backed by a remote model runtime.
pub struct HttpProgramGenerator {
    client: Client,
    artifact: GeneratorArtifact,
    config: GeneratorClientConfig,
}

impl HttpProgramGenerator {
    pub fn new(
        artifact: GeneratorArtifact,
        config: GeneratorClientConfig,
    ) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| GeneratorError::Configuration(error.to_string()))?;
        Ok(Self {
            client,
            artifact,
            config,
        })
    }

    async fn send_request(
        &self,
        payload: &GeneratePayload<'_>,
    ) -> Result<GenerateResponse, GeneratorError> {
        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;

            match self.execute_request(payload).await {
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
            .unwrap_or_else(|| GeneratorError::Inference("retry budget exhausted".to_string())))
    }

    async fn execute_request(
        &self,
        payload: &GeneratePayload<'_>,
    ) -> Result<GenerateResponse, GeneratorError> {
        let response = self
            .client
            .post(&self.artifact.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|error| GeneratorError::Inference(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::Inference(format!("status {}", status)));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|error| GeneratorError::Inference(format!("malformed response: {}", error)))
    }
}

#[async_trait]
impl ProgramGenerator for HttpProgramGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<Candidate>, GeneratorError> {
        if request.beam_width == 0 {
            return Err(GeneratorError::InvalidRequest(
                "beam_width must be at least 1".to_string(),
            ));
        }
        if request.num_return > request.beam_width {
            return Err(GeneratorError::InvalidRequest(format!(
                "num_return {} exceeds beam_width {}",
                request.num_return, request.beam_width
            )));
        }

        let payload = GeneratePayload {
            model_id: &self.artifact.model_id,
            question: request.pruned_input.question(),
            schema_skeleton: request.pruned_input.skeleton(),
            beam_width: request.beam_width,
            num_return: request.num_return,
            seed: request.seed,
        };

        let response = self.send_request(&payload).await?;
        if response.candidates.is_empty() {
            return Err(GeneratorError::NoCandidates);
        }

        let grammar = self.artifact.grammar;
        let mut candidates: Vec<Candidate> = response
            .candidates
            .into_iter()
            .map(|payload| Candidate::new(payload.text, grammar, payload.score, 0))
            .collect();
        candidates = rank_candidates(candidates);
        candidates.truncate(request.num_return);

        debug!(
            candidates = candidates.len(),
            model = %self.artifact.model_id,
            "beam search finished"
        );

        Ok(candidates)
    }

    fn grammar(&self) -> TargetGrammar {
        self.artifact.grammar
    }
}
