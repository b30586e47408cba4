use async_trait::async_trait;

use crate::domain::entities::{SchemaItem, ScoredSchemaItem};
use crate::domain::value_objects::ScoringStrategy;

#[derive(Debug)]
pub enum ScorerError {
    /// The model artifact is missing, unreadable, or does not support the
    /// requested strategy. Fatal for the whole run.
    Configuration(String),
    /// The model runtime failed while scoring. Terminal for the question.
    Inference(String),
    /// The runtime returned a score sequence that does not line up with
    /// the input items.
    ShapeMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for ScorerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorerError::Configuration(msg) => write!(f, "Scorer configuration error: {}", msg),
            ScorerError::Inference(msg) => write!(f, "Scorer inference error: {}", msg),
            ScorerError::ShapeMismatch { expected, got } => write!(
                f,
                "Scorer returned {} scores for {} schema items",
                got, expected
            ),
        }
    }
}

impl std::error::Error for ScorerError {}

/// Relevance scoring oracle: one probability in [0, 1] per schema item,
/// order preserved, stateless across calls.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        question: &str,
        items: &[SchemaItem],
        strategy: ScoringStrategy,
    ) -> Result<Vec<ScoredSchemaItem>, ScorerError>;

    /// Strategies the loaded artifact declares support for.
    fn supported_strategies(&self) -> &[ScoringStrategy];
}
