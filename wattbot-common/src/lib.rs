//! # WattBot Common Library
//!
//! Shared code for the WattBot meter ledger:
//! - Error taxonomy shared by every service operation
//! - Domain models (readings, price entries, settings, migration checkpoints)
//! - Configuration loading and root folder resolution
//! - Database bootstrap and schema migrations

pub mod config;
pub mod db;
pub mod error;

pub use db::models::{
    ArtifactHandle, CheckpointStatus, ConfidenceEntry, Detection, MigrationCheckpoint,
    PriceEntry, Reading, Settings,
};
pub use error::{Error, Result};
