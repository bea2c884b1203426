//! Reading repository
//!
//! CRUD over reading records. Creating and editing a reading goes through
//! the pricing engine; deleting one cascades to its artifacts.
//!
//! Cross-store steps are not atomic. A crash between artifact deletion and
//! row deletion leaves a row with dangling handles; artifact failures during
//! the cascade are logged and never surfaced.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use wattbot_common::db::models::{NewReading, ReadingPatch};
use wattbot_common::{ArtifactHandle, Error, Reading, Result};

use super::artifact_store::{ArtifactMetadata, ArtifactStore};
use super::pricing::PricingEngine;
use crate::db;

fn reading_not_found(id: i64) -> Error {
    Error::NotFound(format!("Reading {}", id))
}

#[derive(Clone)]
pub struct ReadingRepository {
    db: SqlitePool,
    artifacts: Arc<dyn ArtifactStore>,
    pricing: PricingEngine,
}

impl ReadingRepository {
    pub fn new(db: SqlitePool, artifacts: Arc<dyn ArtifactStore>, pricing: PricingEngine) -> Self {
        Self {
            db,
            artifacts,
            pricing,
        }
    }

    /// Price and persist a freshly ingested reading
    pub async fn create(&self, draft: NewReading) -> Result<Reading> {
        let price = self.pricing.price_for_new_reading(draft.captured_value).await?;
        let id = db::readings::insert(&self.db, &draft, price, Utc::now()).await?;

        info!(
            reading_id = id,
            captured_value = draft.captured_value,
            billing_date = %draft.billing_date,
            price,
            "Reading created"
        );

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Reading> {
        db::readings::get(&self.db, id)
            .await?
            .ok_or_else(|| reading_not_found(id))
    }

    /// Reading with the greatest billing date
    pub async fn get_latest(&self) -> Result<Reading> {
        db::readings::latest(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound("No readings recorded".to_string()))
    }

    /// All readings; callers needing a business order must sort themselves
    pub async fn get_all(&self) -> Result<Vec<Reading>> {
        db::readings::list(&self.db).await
    }

    /// Apply an edit and reprice against the new billing date
    pub async fn update(&self, id: i64, patch: ReadingPatch) -> Result<Reading> {
        let existing = self.get(id).await?;

        let captured_value = patch.captured_value.unwrap_or(existing.captured_value);
        let billing_date = patch.billing_date.unwrap_or(existing.billing_date);
        let price = self
            .pricing
            .price_for_edited_reading(id, billing_date, captured_value)
            .await?;

        let affected = db::readings::update_values(
            &self.db,
            id,
            captured_value,
            billing_date,
            price,
            Utc::now(),
        )
        .await?;
        if affected == 0 {
            return Err(reading_not_found(id));
        }

        info!(reading_id = id, captured_value, %billing_date, price, "Reading updated");
        self.get(id).await
    }

    /// Delete a reading and, best-effort, its artifacts
    pub async fn delete(&self, id: i64) -> Result<()> {
        let reading = self.get(id).await?;

        for handle in reading.artifacts() {
            if let Err(e) = self.artifacts.delete(handle).await {
                warn!(reading_id = id, handle = %handle, error = %e, "Artifact delete failed");
            }
        }

        let affected = db::readings::delete(&self.db, id).await?;
        if affected == 0 {
            return Err(reading_not_found(id));
        }

        info!(reading_id = id, "Reading deleted");
        Ok(())
    }

    /// Artifact bytes and metadata for download
    pub async fn artifact(&self, handle: ArtifactHandle) -> Result<(ArtifactMetadata, Vec<u8>)> {
        let metadata = self.artifacts.metadata(handle).await?;
        let bytes = self.artifacts.retrieve(handle).await?;
        Ok((metadata, bytes))
    }
}
