use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::value_objects::ScoringStrategy;

#[derive(Debug)]
pub enum ConfigurationError {
    InvalidValue { var: String, reason: String },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::InvalidValue { var, reason } => {
                write!(f, "Invalid configuration value for {}: {}", var, reason)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Everything one run needs, resolved from the environment once at
/// startup. Serialized into the fingerprint stamped on the correction
/// log; the API key is excluded.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub tables_path: PathBuf,
    pub db_root: PathBuf,
    pub log_dir: PathBuf,
    pub scorer_artifact_path: PathBuf,
    pub generator_artifact_path: PathBuf,
    pub strategy: ScoringStrategy,
    pub k_table: usize,
    pub k_column: usize,
    pub beam_width: usize,
    pub num_return: usize,
    pub seed: Option<u64>,
    pub worker_count: usize,
    pub confidence_threshold: f64,
    pub max_attempts: u32,
    pub probe_timeout_secs: u64,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleConfig {
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub requests_per_second: f64,
    pub max_queue_wait_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            api_key: None,
            model: "qwen3:14b".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            timeout_secs: 120,
            requests_per_second: 2.0,
            max_queue_wait_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tables_path: PathBuf::from("./data/tables.json"),
            db_root: PathBuf::from("./data/database"),
            log_dir: PathBuf::from("./logs"),
            scorer_artifact_path: PathBuf::from("./models/scorer/artifact.json"),
            generator_artifact_path: PathBuf::from("./models/generator/artifact.json"),
            strategy: ScoringStrategy::default(),
            k_table: 4,
            k_column: 5,
            beam_width: 8,
            num_return: 8,
            seed: None,
            worker_count: 4,
            confidence_threshold: 0.3,
            max_attempts: 5,
            probe_timeout_secs: 30,
            oracle: OracleConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve from `T2S_*` environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let config = Self {
            tables_path: env_path("T2S_TABLES_PATH", defaults.tables_path),
            db_root: env_path("T2S_DB_ROOT", defaults.db_root),
            log_dir: env_path("T2S_LOG_DIR", defaults.log_dir),
            scorer_artifact_path: env_path(
                "T2S_SCORER_ARTIFACT",
                defaults.scorer_artifact_path,
            ),
            generator_artifact_path: env_path(
                "T2S_GENERATOR_ARTIFACT",
                defaults.generator_artifact_path,
            ),
            strategy: match env::var("T2S_STRATEGY") {
                Ok(raw) => ScoringStrategy::from_string(&raw).map_err(|reason| {
                    ConfigurationError::InvalidValue {
                        var: "T2S_STRATEGY".to_string(),
                        reason,
                    }
                })?,
                Err(_) => defaults.strategy,
            },
            k_table: env_parse("T2S_K_TABLE", defaults.k_table)?,
            k_column: env_parse("T2S_K_COLUMN", defaults.k_column)?,
            beam_width: env_parse("T2S_BEAM_WIDTH", defaults.beam_width)?,
            num_return: env_parse("T2S_NUM_RETURN", defaults.num_return)?,
            seed: match env::var("T2S_SEED") {
                Ok(raw) => Some(parse_value("T2S_SEED", &raw)?),
                Err(_) => defaults.seed,
            },
            worker_count: env_parse("T2S_WORKERS", defaults.worker_count)?,
            confidence_threshold: env_parse(
                "T2S_CONFIDENCE_THRESHOLD",
                defaults.confidence_threshold,
            )?,
            max_attempts: env_parse("T2S_MAX_ATTEMPTS", defaults.max_attempts)?,
            probe_timeout_secs: env_parse("T2S_PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs)?,
            oracle: OracleConfig {
                endpoint: env::var("T2S_ORACLE_ENDPOINT")
                    .unwrap_or(defaults.oracle.endpoint),
                api_key: env::var("T2S_ORACLE_API_KEY").ok(),
                model: env::var("T2S_ORACLE_MODEL").unwrap_or(defaults.oracle.model),
                temperature: env_parse("T2S_ORACLE_TEMPERATURE", defaults.oracle.temperature)?,
                max_tokens: env_parse("T2S_ORACLE_MAX_TOKENS", defaults.oracle.max_tokens)?,
                timeout_secs: env_parse("T2S_ORACLE_TIMEOUT_SECS", defaults.oracle.timeout_secs)?,
                requests_per_second: env_parse(
                    "T2S_ORACLE_RPS",
                    defaults.oracle.requests_per_second,
                )?,
                max_queue_wait_secs: env_parse(
                    "T2S_ORACLE_MAX_QUEUE_WAIT_SECS",
                    defaults.oracle.max_queue_wait_secs,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.k_table == 0 || self.k_column == 0 {
            return Err(ConfigurationError::InvalidValue {
                var: "T2S_K_TABLE/T2S_K_COLUMN".to_string(),
                reason: "budgets must be at least 1".to_string(),
            });
        }
        if self.beam_width == 0 {
            return Err(ConfigurationError::InvalidValue {
                var: "T2S_BEAM_WIDTH".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.num_return > self.beam_width {
            return Err(ConfigurationError::InvalidValue {
                var: "T2S_NUM_RETURN".to_string(),
                reason: format!(
                    "{} exceeds beam width {}",
                    self.num_return, self.beam_width
                ),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                var: "T2S_MAX_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigurationError::InvalidValue {
                var: "T2S_CONFIDENCE_THRESHOLD".to_string(),
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Hex digest of the serialized configuration, stamped on the
    /// correction log so runs stay attributable.
    pub fn fingerprint(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        format!("{:x}", digest)
    }
}

fn env_path(var: &str, default: PathBuf) -> PathBuf {
    env::var(var).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => parse_value(var, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|error: T::Err| ConfigurationError::InvalidValue {
        var: var.to_string(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.oracle.model, "qwen3:14b");
        assert_eq!(config.oracle.timeout_secs, 120);
    }

    #[test]
    fn test_num_return_above_beam_width_rejected() {
        let config = PipelineConfig {
            beam_width: 4,
            num_return: 8,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_confidence_threshold_bounds() {
        let config = PipelineConfig {
            confidence_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let config = PipelineConfig::default();
        assert_eq!(config.fingerprint(), config.fingerprint());

        let other = PipelineConfig {
            k_table: 6,
            ..PipelineConfig::default()
        };
        assert_ne!(config.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_api_key_never_enters_fingerprint() {
        let without = PipelineConfig::default();
        let with_key = PipelineConfig {
            oracle: OracleConfig {
                api_key: Some("secret".to_string()),
                ..OracleConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert_eq!(without.fingerprint(), with_key.fingerprint());
    }
}
