use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::application::ports::query_executor::{
    ExecutorError, ProbeErrorClass, ProbeOutcome, QueryExecutor,
};

/// Validation probe and execution against per-database SQLite files laid
/// out as `<db_root>/<db_id>/<db_id>.sqlite`.
pub struct SqliteExecutor {
    db_root: PathBuf,
    probe_timeout: Duration,
    busy_timeout: Duration,
}

impl SqliteExecutor {
    pub fn new(db_root: impl Into<PathBuf>, probe_timeout: Duration) -> Self {
        Self {
            db_root: db_root.into(),
            probe_timeout,
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn db_path(&self, db_id: &str) -> PathBuf {
        self.db_root.join(db_id).join(format!("{}.sqlite", db_id))
    }

    fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        Ok(conn)
    }

    fn run_probe(
        path: PathBuf,
        program: String,
        busy_timeout: Duration,
    ) -> Result<usize, rusqlite::Error> {
        let conn = Self::open_read_only(&path, busy_timeout)?;
        let mut stmt = conn.prepare(&program)?;
        let mut rows = stmt.query([])?;
        let mut count = 0usize;
        while rows.next()?.is_some() {
            count += 1;
            // A probe only needs to prove the query runs.
            if count >= 1000 {
                break;
            }
        }
        Ok(count)
    }
}

/// Normalize a program before handing it to SQLite: trim, drop markdown
/// fences, strip one trailing semicolon, collapse whitespace runs.
pub fn clean_sql(sql: &str) -> String {
    let mut cleaned = sql.trim();

    if let Some(rest) = cleaned.strip_prefix("```sql") {
        cleaned = rest.trim();
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest.trim();
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim();
    }
    if let Some(rest) = cleaned.strip_suffix(';') {
        cleaned = rest.trim();
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a SQLite error message onto the coarse classes the diagnostic
/// generator understands.
fn classify_error(message: &str) -> ProbeErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("syntax error") || lower.contains("near") {
        ProbeErrorClass::Syntax
    } else if lower.contains("no such table") || lower.contains("no such column") {
        ProbeErrorClass::UnknownSchemaItem
    } else if lower.contains("ambiguous column") {
        ProbeErrorClass::AmbiguousColumn
    } else if lower.contains("database is locked") || lower.contains("busy") {
        ProbeErrorClass::Locked
    } else {
        ProbeErrorClass::Other
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn probe(&self, db_id: &str, program: &str) -> ProbeOutcome {
        let started = Instant::now();

        let program = clean_sql(program);
        if program.is_empty() {
            return ProbeOutcome::failed(
                ProbeErrorClass::Syntax,
                "query is empty after cleaning",
                0,
            );
        }

        let path = self.db_path(db_id);
        if !path.exists() {
            return ProbeOutcome::failed(
                ProbeErrorClass::Other,
                format!("database file not found: {}", path.display()),
                0,
            );
        }

        let busy_timeout = self.busy_timeout;
        let task =
            tokio::task::spawn_blocking(move || Self::run_probe(path, program, busy_timeout));

        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;
        match tokio::time::timeout(self.probe_timeout, task).await {
            Ok(Ok(Ok(count))) => {
                debug!(db_id, rows = count, "probe passed");
                ProbeOutcome::passed(Some(count), elapsed(started))
            }
            Ok(Ok(Err(error))) => {
                let message = error.to_string();
                ProbeOutcome::failed(classify_error(&message), message, elapsed(started))
            }
            Ok(Err(join_error)) => ProbeOutcome::failed(
                ProbeErrorClass::Other,
                format!("probe task failed: {}", join_error),
                elapsed(started),
            ),
            Err(_) => ProbeOutcome::failed(
                ProbeErrorClass::Timeout,
                format!("probe exceeded {}ms", self.probe_timeout.as_millis()),
                elapsed(started),
            ),
        }
    }

    async fn execute(
        &self,
        db_id: &str,
        program: &str,
        limit: usize,
    ) -> Result<Vec<Vec<String>>, ExecutorError> {
        let path = self.db_path(db_id);
        if !path.exists() {
            return Err(ExecutorError::DatabaseMissing(path.display().to_string()));
        }

        let program = clean_sql(program);
        let busy_timeout = self.busy_timeout;
        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<String>>, rusqlite::Error> {
            let conn = SqliteExecutor::open_read_only(&path, busy_timeout)?;
            let mut stmt = conn.prepare(&program)?;
            let column_count = stmt.column_count();
            let mut rows = stmt.query([])?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(column_count);
                for index in 0..column_count {
                    let cell: Option<String> = match row.get_ref(index)? {
                        rusqlite::types::ValueRef::Null => None,
                        rusqlite::types::ValueRef::Integer(v) => Some(v.to_string()),
                        rusqlite::types::ValueRef::Real(v) => Some(v.to_string()),
                        rusqlite::types::ValueRef::Text(v) => {
                            Some(String::from_utf8_lossy(v).into_owned())
                        }
                        rusqlite::types::ValueRef::Blob(v) => Some(format!("<blob:{}>", v.len())),
                    };
                    cells.push(cell.unwrap_or_default());
                }
                collected.push(cells);
                if collected.len() >= limit {
                    break;
                }
            }
            Ok(collected)
        })
        .await
        .map_err(|join_error| ExecutorError::Execution(join_error.to_string()))?
        .map_err(|error| ExecutorError::Execution(error.to_string()))?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_database(root: &TempDir, db_id: &str) {
        let dir = root.path().join(db_id);
        std::fs::create_dir_all(&dir).unwrap();
        let conn = Connection::open(dir.join(format!("{}.sqlite", db_id))).unwrap();
        conn.execute_batch(
            "CREATE TABLE singer (singer_id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
             INSERT INTO singer VALUES (1, 'Joe', 52), (2, 'Ann', 31);
             CREATE TABLE concert (concert_id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO concert VALUES (1, 'Summer Fest');",
        )
        .unwrap();
    }

    fn executor(root: &TempDir) -> SqliteExecutor {
        SqliteExecutor::new(root.path(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_valid_query_passes_probe() {
        let root = TempDir::new().unwrap();
        seed_database(&root, "concert_singer");

        let outcome = executor(&root)
            .probe("concert_singer", "SELECT name FROM singer WHERE age > 40")
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.row_count, Some(1));
    }

    #[tokio::test]
    async fn test_syntax_error_is_classified() {
        let root = TempDir::new().unwrap();
        seed_database(&root, "concert_singer");

        let outcome = executor(&root)
            .probe("concert_singer", "SELEC name FROM singer")
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_class, Some(ProbeErrorClass::Syntax));
    }

    #[tokio::test]
    async fn test_unknown_table_is_classified() {
        let root = TempDir::new().unwrap();
        seed_database(&root, "concert_singer");

        let outcome = executor(&root)
            .probe("concert_singer", "SELECT name FROM singers")
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error_class,
            Some(ProbeErrorClass::UnknownSchemaItem)
        );
    }

    #[tokio::test]
    async fn test_ambiguous_column_is_classified() {
        let root = TempDir::new().unwrap();
        seed_database(&root, "concert_singer");

        let outcome = executor(&root)
            .probe(
                "concert_singer",
                "SELECT name FROM singer JOIN concert ON singer.singer_id = concert.concert_id",
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_class, Some(ProbeErrorClass::AmbiguousColumn));
    }

    #[tokio::test]
    async fn test_missing_database_fails_probe() {
        let root = TempDir::new().unwrap();

        let outcome = executor(&root).probe("no_such_db", "SELECT 1").await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_class, Some(ProbeErrorClass::Other));
    }

    #[tokio::test]
    async fn test_execute_returns_rows_up_to_limit() {
        let root = TempDir::new().unwrap();
        seed_database(&root, "concert_singer");

        let rows = executor(&root)
            .execute(
                "concert_singer",
                "SELECT name, age FROM singer ORDER BY singer_id",
                1,
            )
            .await
            .unwrap();

        assert_eq!(rows, vec![vec!["Joe".to_string(), "52".to_string()]]);
    }

    #[tokio::test]
    async fn test_execute_missing_database_is_an_error() {
        let root = TempDir::new().unwrap();

        let result = executor(&root).execute("ghost", "SELECT 1", 10).await;
        assert!(matches!(result, Err(ExecutorError::DatabaseMissing(_))));
    }

    #[test]
    fn test_clean_sql_normalizes() {
        assert_eq!(
            clean_sql("```sql\nSELECT  name\nFROM singer ;\n```"),
            "SELECT name FROM singer"
        );
        assert_eq!(clean_sql("  SELECT 1;  "), "SELECT 1");
        assert_eq!(clean_sql(""), "");
    }
}
