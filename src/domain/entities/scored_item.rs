use serde::{Deserialize, Serialize};

use crate::domain::entities::SchemaItem;
use crate::domain::value_objects::ScoringStrategy;

/// A schema item paired with its relevance probability for one question.
/// Produced fresh per question and discarded after the pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSchemaItem {
    item: SchemaItem,
    probability: f64,
    strategy: ScoringStrategy,
}

impl ScoredSchemaItem {
    /// Probabilities outside [0, 1] are clamped; non-finite values
    /// collapse to 0.
    pub fn new(item: SchemaItem, probability: f64, strategy: ScoringStrategy) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            item,
            probability,
            strategy,
        }
    }

    pub fn item(&self) -> &SchemaItem {
        &self.item
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }
}
