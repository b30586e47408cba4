use async_trait::async_trait;

use crate::domain::entities::{Candidate, PrunedInput};
use crate::domain::value_objects::TargetGrammar;

#[derive(Debug)]
pub enum GeneratorError {
    /// The model artifact is missing or unreadable. Fatal for the run.
    Configuration(String),
    /// Beam search produced zero candidates. Terminal for the question:
    /// there is nothing for the correction controller to work with.
    NoCandidates,
    /// The request itself is malformed (e.g. num_return > beam_width).
    InvalidRequest(String),
    /// The model runtime failed. Terminal for the question.
    Inference(String),
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Configuration(msg) => {
                write!(f, "Generator configuration error: {}", msg)
            }
            GeneratorError::NoCandidates => write!(f, "Generator returned zero candidates"),
            GeneratorError::InvalidRequest(msg) => write!(f, "Invalid generation request: {}", msg),
            GeneratorError::Inference(msg) => write!(f, "Generator inference error: {}", msg),
        }
    }
}

impl std::error::Error for GeneratorError {}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub pruned_input: PrunedInput,
    pub beam_width: usize,
    pub num_return: usize,
    /// Fixed seed for reproducible beam search; forwarded to the runtime.
    pub seed: Option<u64>,
}

/// Sequence generation oracle adapter. Returned candidates are ordered by
/// the oracle's own score (non-increasing), tagged with the target
/// grammar, and limited to `num_return`.
#[async_trait]
pub trait ProgramGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<Candidate>, GeneratorError>;

    fn grammar(&self) -> TargetGrammar;
}
