use serde::{Deserialize, Serialize};

use crate::domain::value_objects::TargetGrammar;

/// One generated program hypothesis. A question yields an ordered
/// sequence of candidates, rank 0 being the generator's best.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    text: String,
    grammar: TargetGrammar,
    confidence: f64,
    rank: usize,
}

impl Candidate {
    pub fn new(
        text: impl Into<String>,
        grammar: TargetGrammar,
        confidence: f64,
        rank: usize,
    ) -> Self {
        Self {
            text: text.into(),
            grammar,
            confidence,
            rank,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn grammar(&self) -> TargetGrammar {
        self.grammar
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Order candidates by descending confidence, preserving generation
/// order for equal scores, then reassign ranks. Stable by construction
/// (`sort_by` is a stable sort).
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (rank, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = rank;
    }
    candidates
}
