pub mod correction_controller;
pub mod pipeline;
pub mod schema_pruner;

pub use correction_controller::{CorrectionController, CorrectionOutcome, CorrectionPolicy};
pub use pipeline::{PipelineOptions, PipelineService, PipelineStats, Question};
pub use schema_pruner::SchemaPruner;
