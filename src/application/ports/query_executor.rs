use async_trait::async_trait;

/// Coarse classification of a failed probe, used to build the targeted
/// diagnostic sent to the correction oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorClass {
    Syntax,
    UnknownSchemaItem,
    AmbiguousColumn,
    Locked,
    Timeout,
    Other,
}

/// Result of one validation probe. A failed probe is data, not an error:
/// it drives the correction loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub error_class: Option<ProbeErrorClass>,
    pub row_count: Option<usize>,
    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    pub fn passed(row_count: Option<usize>, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            error: None,
            error_class: None,
            row_count,
            elapsed_ms,
        }
    }

    pub fn failed(class: ProbeErrorClass, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_class: Some(class),
            row_count: None,
            elapsed_ms,
        }
    }
}

#[derive(Debug)]
pub enum ExecutorError {
    DatabaseMissing(String),
    Execution(String),
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::DatabaseMissing(db_id) => write!(f, "Database not found: {}", db_id),
            ExecutorError::Execution(msg) => write!(f, "Execution error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {}

/// Database execution interface, used for validation probes during
/// correction and for result-set comparison during evaluation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute-or-parse probe: deterministic, local, never raises.
    async fn probe(&self, db_id: &str, program: &str) -> ProbeOutcome;

    /// Run a query and return its rows (stringified cells), capped at
    /// `limit` rows. Used by the evaluation harness.
    async fn execute(
        &self,
        db_id: &str,
        program: &str,
        limit: usize,
    ) -> Result<Vec<Vec<String>>, ExecutorError>;
}
