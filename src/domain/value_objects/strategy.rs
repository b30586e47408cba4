use serde::{Deserialize, Serialize};

/// Scoring strategy variant for the schema relevance scorer.
///
/// The three variants are peer configurations of the same model family:
/// `Gated` fuses column-level and table-level attention through a learned
/// gate, `Ungated` disables the gate in favor of unweighted fusion, and
/// `FixedAttention` replaces the learned attention weights with a fixed
/// distribution. All three are dispatched through the same scorer port;
/// the choice is configuration, not a different artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    Gated,
    Ungated,
    FixedAttention,
}

impl ScoringStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStrategy::Gated => "gated",
            ScoringStrategy::Ungated => "ungated",
            ScoringStrategy::FixedAttention => "fixed_attention",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "gated" => Ok(ScoringStrategy::Gated),
            "ungated" => Ok(ScoringStrategy::Ungated),
            "fixed_attention" => Ok(ScoringStrategy::FixedAttention),
            _ => Err(format!("Invalid scoring strategy: {}", s)),
        }
    }

    pub fn all() -> [ScoringStrategy; 3] {
        [
            ScoringStrategy::Gated,
            ScoringStrategy::Ungated,
            ScoringStrategy::FixedAttention,
        ]
    }
}

impl Default for ScoringStrategy {
    fn default() -> Self {
        ScoringStrategy::Gated
    }
}

impl std::fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
