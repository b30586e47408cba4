pub mod sqlite_executor;

pub use sqlite_executor::SqliteExecutor;
