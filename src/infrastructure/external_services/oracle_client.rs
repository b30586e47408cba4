use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::correction_oracle::{
    CorrectionOracle, CorrectionRequest, CorrectionResponse, OracleError,
};
use crate::infrastructure::external_services::rate_limiter::RateLimiter;

const STOP_SEQUENCES: [&str; 3] = ["#;\n\n", "\n\n---", "---\n"];

#[derive(Debug, Clone)]
pub struct OracleClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub requests_per_second: f64,
    pub max_queue_wait: Duration,
}

impl Default for OracleClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            api_key: None,
            model: "qwen3:14b".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            timeout: Duration::from_secs(120),
            requests_per_second: 2.0,
            max_queue_wait: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Remote correction oracle over an OpenAI-compatible chat endpoint.
/// One `request_correction` call is one network round-trip; the retry
/// budget lives with the caller.
pub struct HttpCorrectionOracle {
    client: Client,
    config: OracleClientConfig,
    limiter: RateLimiter,
}

impl HttpCorrectionOracle {
    pub fn new(config: OracleClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let limiter = RateLimiter::new(config.requests_per_second, config.max_queue_wait);
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    fn build_prompt(request: &CorrectionRequest) -> String {
        format!(
            "You are an expert SQL developer capable of identifying and correcting errors \
             in SQL queries generated from natural language.\n\
             Given a natural language question, the database schema, and an initial SQL query, \
             review the initial SQL and provide a corrected version that answers the question \
             accurately based on the schema.\n\n\
             Please pay close attention to the following hint, which is based on a preliminary \
             validation of the initial SQL.\n\n\
             Schema:\n{}\n\n\
             Problem: {}\n\
             Initial SQL: {}\n\
             Hint: {}\n\
             Correct SQL:",
            request.schema_skeleton, request.question, request.program, request.diagnostic
        )
    }
}

#[async_trait]
impl CorrectionOracle for HttpCorrectionOracle {
    async fn request_correction(
        &self,
        request: &CorrectionRequest,
    ) -> Result<CorrectionResponse, OracleError> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| OracleError::RateLimited)?;

        let payload = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_prompt(request),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Transport(error.without_url().to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(OracleError::Api(format!("status {}: {}", status, snippet)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|error| OracleError::Api(format!("malformed response: {}", error)))?;

        let content = chat
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| OracleError::Api("response contained no choices".to_string()))?;

        let program = extract_program(&content);
        debug!(parsed = program.is_some(), "oracle response parsed");

        Ok(CorrectionResponse {
            program,
            rationale: None,
            raw: content,
        })
    }
}

/// Pull a single SQL program out of free-form oracle text. Tries explicit
/// answer markers first, then the first SQL keyword, then the whole text
/// when it smells like SQL. Returns `None` for prose with no program.
pub fn extract_program(text: &str) -> Option<String> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return None;
    }

    const MARKERS: [&str; 5] = [
        "Fixed SQL:",
        "Corrected SQL:",
        "Correct SQL:",
        "SQL:",
        "Fixed:",
    ];
    for marker in MARKERS {
        if let Some((_, rest)) = cleaned.split_once(marker) {
            if let Some(program) = extract_from_fragment(rest) {
                return Some(program);
            }
        }
    }

    for found in keyword_pattern().find_iter(cleaned) {
        if let Some(program) = extract_from_fragment(&cleaned[found.start()..]) {
            return Some(program);
        }
    }

    let upper = cleaned.to_uppercase();
    if ["FROM", "WHERE", "JOIN"].iter().any(|p| upper.contains(p)) {
        return extract_from_fragment(cleaned);
    }

    None
}

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|WITH)\b").expect("valid pattern")
    })
}

fn extract_from_fragment(text: &str) -> Option<String> {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```sql") {
        text = rest.trim();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim();
    }

    for stop in STOP_SEQUENCES {
        if let Some((head, _)) = text.split_once(stop) {
            text = head.trim();
        }
    }

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("--")
            || line.starts_with("Note:")
        {
            continue;
        }
        let candidate = line.trim_end_matches(';').trim();
        let upper = candidate.to_uppercase();
        let is_program = ["SELECT", "INSERT", "UPDATE", "DELETE"]
            .iter()
            .any(|keyword| upper.contains(keyword));
        if candidate.len() > 10 && is_program {
            return Some(candidate.to_string());
        }
    }

    None
}
