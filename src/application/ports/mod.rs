pub mod correction_log_store;
pub mod correction_oracle;
pub mod program_generator;
pub mod query_executor;
pub mod relevance_scorer;

pub use correction_log_store::CorrectionLogStore;
pub use correction_oracle::CorrectionOracle;
pub use program_generator::ProgramGenerator;
pub use query_executor::QueryExecutor;
pub use relevance_scorer::RelevanceScorer;
