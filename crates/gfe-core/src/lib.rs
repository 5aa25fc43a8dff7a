//! GFE Core - Event model, error types, and shared configuration
//!
//! This crate defines the abstractions shared by the evaluator and the CLI:
//! - The timestamped match event (AI-detected or ground truth)
//! - Strictness levels used when pairing events
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{BatchConfig, ConfigError, EvalConfig, EvaluationConfig, LoggingConfig};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for evaluation runs
#[derive(Error, Debug)]
pub enum GfeError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("Invalid evaluation setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GfeError>;

// ============================================================================
// Strictness
// ============================================================================

/// Which event attributes must agree for two events to be paired.
///
/// Every level requires the time window and action equality:
/// - `Strict`: team and outcome must also agree
/// - `Medium`: outcome must also agree, team is ignored
/// - `Loose`: time and action only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictnessLevel {
    Strict,
    Medium,
    Loose,
}

impl StrictnessLevel {
    /// All levels, strictest first
    pub const ALL: [StrictnessLevel; 3] = [Self::Strict, Self::Medium, Self::Loose];

    /// Whether team equality is required at this level
    pub fn requires_team(self) -> bool {
        matches!(self, Self::Strict)
    }

    /// Whether outcome equality is required at this level
    pub fn requires_outcome(self) -> bool {
        matches!(self, Self::Strict | Self::Medium)
    }
}

impl std::fmt::Display for StrictnessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Medium => write!(f, "medium"),
            Self::Loose => write!(f, "loose"),
        }
    }
}

impl std::str::FromStr for StrictnessLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "medium" => Ok(Self::Medium),
            "loose" => Ok(Self::Loose),
            _ => Err(ConfigError::InvalidValue {
                key: "strictness_level".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// A single detected or ground-truth occurrence in a match.
///
/// `action`, `team` and `outcome` are open vocabularies ("Shot", "Kickout",
/// "home", "Point", ...) and are kept as plain strings. `fields` holds the
/// record exactly as it was read so reports can echo it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier, unique within its source list
    pub id: String,

    /// Seconds from the source's time origin
    pub time: f64,

    /// Event type (e.g. "Shot", "Kickout", "Turnover")
    pub action: String,

    /// Team that performed the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    /// Qualifier such as "Point", "Wide" or "Won"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// Original record fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Create a new event
    pub fn new(id: impl Into<String>, time: f64, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time,
            action: action.into(),
            team: None,
            outcome: None,
            fields: Map::new(),
        }
    }

    /// Set team
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Set outcome
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Attach the original record fields
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    /// Copy of this event with `offset` seconds added to its time
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            time: self.time + offset,
            ..self.clone()
        }
    }

    /// Absolute time difference to another event
    pub fn time_delta(&self, other: &Event) -> f64 {
        (self.time - other.time).abs()
    }
}

/// Which list an event was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Detected by the AI pipeline
    Ai,
    /// Hand-annotated ground truth
    GroundTruth,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::GroundTruth => write!(f, "gt"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
