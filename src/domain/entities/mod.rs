pub mod candidate;
pub mod correction;
pub mod pipeline_result;
pub mod pruned_input;
pub mod schema_item;
pub mod scored_item;

pub use candidate::{rank_candidates, Candidate};
pub use correction::{AttemptStatus, CorrectionAttempt, CorrectionLog};
pub use pipeline_result::PipelineResult;
pub use pruned_input::{PrunedInput, PrunedTable};
pub use schema_item::{DatabaseSchema, SchemaItem, SchemaItemKind, TablesRecord};
pub use scored_item::ScoredSchemaItem;
