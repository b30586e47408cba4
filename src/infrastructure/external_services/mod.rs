pub mod generator_client;
pub mod oracle_client;
pub mod rate_limiter;
pub mod scorer_client;

pub use generator_client::{GeneratorArtifact, GeneratorClientConfig, HttpProgramGenerator};
pub use oracle_client::{HttpCorrectionOracle, OracleClientConfig};
pub use rate_limiter::RateLimiter;
pub use scorer_client::{HttpRelevanceScorer, ScorerArtifact, ScorerClientConfig};
