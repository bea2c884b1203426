//! Domain services

pub mod artifact_store;
pub mod assembler;
pub mod backfill;
pub mod detector;
pub mod ingest;
pub mod pricing;
pub mod repository;

pub use artifact_store::{ArtifactMetadata, ArtifactStore, FsArtifactStore};
pub use backfill::{BackfillHandle, BackfillRunner, DataMigration, BACKFILL_MIGRATION_ID};
pub use detector::{CommandDetector, Detector, DetectorConfig, DetectorOutput};
pub use ingest::IngestService;
pub use pricing::PricingEngine;
pub use repository::ReadingRepository;
