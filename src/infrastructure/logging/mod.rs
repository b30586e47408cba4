pub mod jsonl_log_store;

pub use jsonl_log_store::JsonlCorrectionLogStore;
