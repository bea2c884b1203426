//! Common error types for WattBot
//!
//! The first block of variants is the domain taxonomy every core operation
//! reports through. The HTTP layer maps each of them to a status code in
//! exactly one place (`wattbot_server::error`).

use thiserror::Error;

/// Common result type for WattBot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across WattBot components
#[derive(Error, Debug)]
pub enum Error {
    /// Document or artifact absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The assembler could not parse a number from the detections
    #[error("No number has been found in the image")]
    NoNumberDetected,

    /// New reading does not exceed the latest recorded value
    #[error("Reading already exists for this period: {0}")]
    DuplicatePeriod(String),

    /// No applicable price entry
    #[error("No price found: {0}")]
    NoPriceFound(String),

    /// Checkpoint-level failure of a data migration
    #[error("Migration failed: {0}")]
    MigrationFailure(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External detector invocation failed
    #[error("Detector error: {0}")]
    Detector(String),

    /// The detector ran but could not decode this particular image
    #[error("Image could not be decoded: {0}")]
    UnreadableImage(String),

    /// Stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the `NotFound` member of the taxonomy
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
