//! GFE Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with defaults matching the annotated
//! datasets the evaluator is usually run against.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::StrictnessLevel;

/// Main evaluator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Matching and windowing settings
    pub evaluation: EvaluationConfig,

    /// Batch runner settings
    pub batch: BatchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl EvalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Evaluation
        if let Some(value) = lookup("GFE_TOLERANCE_SECONDS") {
            self.evaluation.tolerance_seconds = parse_f64("GFE_TOLERANCE_SECONDS", &value)?;
        }
        if let Some(value) = lookup("GFE_STRICTNESS_LEVEL") {
            self.evaluation.strictness_levels = parse_levels(&value)?;
        }
        if let Some(value) = lookup("GFE_TIME_LIMIT") {
            self.evaluation.time_limit = Some(parse_f64("GFE_TIME_LIMIT", &value)?);
        }
        if let Some(value) = lookup("GFE_TIME_ORIGIN_OFFSET") {
            self.evaluation.time_origin_offset = parse_f64("GFE_TIME_ORIGIN_OFFSET", &value)?;
        }

        // Batch
        if let Some(value) = lookup("GFE_MAX_CONCURRENCY") {
            self.batch.max_concurrency =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "GFE_MAX_CONCURRENCY".to_string(),
                    value,
                })?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("LOG_JSON") {
            self.logging.json_format = matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(self)
    }

    /// Reject settings that would make an evaluation meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let eval = &self.evaluation;

        if !eval.tolerance_seconds.is_finite() || eval.tolerance_seconds <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "tolerance_seconds".to_string(),
                value: eval.tolerance_seconds.to_string(),
            });
        }
        if let Some(limit) = eval.time_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "time_limit".to_string(),
                    value: limit.to_string(),
                });
            }
        }
        if !eval.time_origin_offset.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "time_origin_offset".to_string(),
                value: eval.time_origin_offset.to_string(),
            });
        }
        if eval.strictness_levels.is_empty() {
            return Err(ConfigError::MissingRequired(
                "at least one strictness level".to_string(),
            ));
        }
        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrency".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

/// Matching and windowing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Maximum time difference for two events to pair (seconds)
    pub tolerance_seconds: f64,

    /// Levels to evaluate, each producing its own report
    pub strictness_levels: Vec<StrictnessLevel>,

    /// Only events at or before this time are evaluated (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,

    /// Seconds added to ground-truth times to align them with the AI timeline
    pub time_origin_offset: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: 20.0,
            strictness_levels: vec![StrictnessLevel::Strict],
            time_limit: None,
            time_origin_offset: 0.0,
        }
    }
}

/// Batch runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Matches evaluated at the same time
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Parse a comma-separated list of strictness levels
pub fn parse_levels(value: &str) -> Result<Vec<StrictnessLevel>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
