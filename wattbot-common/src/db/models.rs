//! Database models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque handle into the artifact store
///
/// Serialized as the hyphenated UUID string everywhere: database columns,
/// JSON bodies and URL path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(Uuid);

impl ArtifactHandle {
    /// Generate a fresh handle
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse an optional database column into a handle
    ///
    /// A malformed stored value is corrupt data, not a missing artifact.
    pub fn from_column(value: Option<String>) -> Result<Option<Self>> {
        value
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| {
                    Error::Serialization(format!("Corrupt artifact handle column '{}': {}", s, e))
                })
            })
            .transpose()
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ArtifactHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::NotFound(format!("Invalid artifact handle '{}': {}", s, e)))
    }
}

/// Single recognized symbol as reported by the detector, before ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Horizontal position (box center) used for left-to-right ordering
    pub position: f64,
    pub symbol: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Detection {
    pub fn new(position: f64, symbol: impl Into<String>, confidence: f64) -> Self {
        Self {
            position,
            symbol: symbol.into(),
            confidence,
        }
    }
}

/// One recognized character of a reading, in reading order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceEntry {
    pub symbol: String,
    pub confidence: f64,
}

/// One recorded meter observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub captured_value: f64,
    pub billing_date: NaiveDate,
    pub modified_at: DateTime<Utc>,
    pub price: f64,
    pub original_artifact: Option<ArtifactHandle>,
    pub annotated_artifact: Option<ArtifactHandle>,
    pub label_artifact: Option<ArtifactHandle>,
    pub file_name: String,
    pub confidence_array: Vec<ConfidenceEntry>,
    pub score: f64,
}

impl Reading {
    /// Artifact handles owned by this reading, in store order
    pub fn artifacts(&self) -> Vec<ArtifactHandle> {
        [
            self.original_artifact,
            self.annotated_artifact,
            self.label_artifact,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Reading produced by the ingestion pipeline, not yet persisted
#[derive(Debug, Clone)]
pub struct NewReading {
    pub captured_value: f64,
    pub billing_date: NaiveDate,
    pub original_artifact: Option<ArtifactHandle>,
    pub annotated_artifact: Option<ArtifactHandle>,
    pub label_artifact: Option<ArtifactHandle>,
    pub file_name: String,
    pub confidence_array: Vec<ConfidenceEntry>,
    pub score: f64,
}

/// Editable fields of a reading
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadingPatch {
    pub captured_value: Option<f64>,
    pub billing_date: Option<NaiveDate>,
}

/// Unit price valid from `effective_date` onwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub id: i64,
    pub price_per_unit: f64,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_default: bool,
}

/// Price entry fields supplied by a caller
#[derive(Debug, Clone, Deserialize)]
pub struct PriceEntryInput {
    pub price_per_unit: f64,
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub is_default: bool,
}

/// UI theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DarkModePreference {
    #[default]
    Auto,
    On,
    Off,
}

impl DarkModePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            DarkModePreference::Auto => "auto",
            DarkModePreference::On => "on",
            DarkModePreference::Off => "off",
        }
    }

    /// Unknown stored values fall back to `Auto`
    pub fn from_db(value: &str) -> Self {
        match value {
            "on" => DarkModePreference::On,
            "off" => DarkModePreference::Off,
            _ => DarkModePreference::Auto,
        }
    }
}

/// Application settings singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Gates the pricing engine entirely
    pub calculate_pricing: bool,
    /// Display only
    pub currency: String,
    pub dark_mode_preference: DarkModePreference,
    pub debug_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings fields supplied by a caller
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub calculate_pricing: bool,
    pub currency: String,
    #[serde(default)]
    pub dark_mode_preference: DarkModePreference,
    #[serde(default)]
    pub debug_mode: bool,
}

/// Lifecycle state of a data migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Running,
    Done,
    Failed,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Running => "running",
            CheckpointStatus::Done => "done",
            CheckpointStatus::Failed => "failed",
        }
    }
}

impl FromStr for CheckpointStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(CheckpointStatus::Running),
            "done" => Ok(CheckpointStatus::Done),
            "failed" => Ok(CheckpointStatus::Failed),
            other => Err(Error::Serialization(format!(
                "unknown checkpoint status '{}'",
                other
            ))),
        }
    }
}

/// Persisted progress of a resumable data migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationCheckpoint {
    pub name: String,
    pub status: CheckpointStatus,
    pub last_processed_id: Option<i64>,
    pub processed_count: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
