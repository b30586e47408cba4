use async_trait::async_trait;

#[derive(Debug)]
pub enum OracleError {
    /// Network-level failure (connect, reset, DNS, bad status).
    Transport(String),
    /// The per-call timeout elapsed.
    Timeout,
    /// The rate limiter refused a slot within the bounded queue wait.
    RateLimited,
    /// The endpoint answered with an unusable payload.
    Api(String),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "Oracle transport error: {}", msg),
            OracleError::Timeout => write!(f, "Oracle call timed out"),
            OracleError::RateLimited => write!(f, "Oracle rate limit queue wait exceeded"),
            OracleError::Api(msg) => write!(f, "Oracle API error: {}", msg),
        }
    }
}

impl std::error::Error for OracleError {}

/// What the controller sends for one correction round.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    pub question: String,
    pub schema_skeleton: String,
    pub program: String,
    /// Diagnostic from the failed validation probe (or a low-confidence
    /// note when the program validated but scored below threshold).
    pub diagnostic: String,
}

/// What one correction round yields. `program` is the extracted
/// replacement program, `None` when the raw response contained none.
#[derive(Debug, Clone)]
pub struct CorrectionResponse {
    pub program: Option<String>,
    pub rationale: Option<String>,
    pub raw: String,
}

/// The remote correction oracle. One implementation call is exactly one
/// network round-trip: the retry budget lives in the controller, not
/// here.
#[async_trait]
pub trait CorrectionOracle: Send + Sync {
    async fn request_correction(
        &self,
        request: &CorrectionRequest,
    ) -> Result<CorrectionResponse, OracleError>;
}
