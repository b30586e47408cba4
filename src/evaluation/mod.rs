pub mod harness;
pub mod metrics;

pub use harness::{BucketStats, EvaluationHarness, EvaluationReport};
pub use metrics::{exact_match, normalize_program, result_sets_match};
