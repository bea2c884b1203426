//! Resumable backfill of derived reading fields
//!
//! Re-runs the detector over every stored original photo and rewrites the
//! confidence array and score of each reading. Progress is checkpointed in
//! `data_migrations` after every batch, so a crashed or cancelled run picks
//! up at the first uncommitted batch. A batch that failed halfway is redone
//! in full; the derivation depends only on stored bytes, so that is safe.
//!
//! A reading whose photo is gone or cannot be decoded keeps its old fields
//! and still counts as processed. Every other failure stops the run.
//!
//! Running two instances against the same database at once is not guarded.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wattbot_common::{CheckpointStatus, Error, MigrationCheckpoint, Reading, Result};

use super::artifact_store::ArtifactStore;
use super::assembler;
use super::detector::{detect_blocking, Detector, DetectorConfig};
use crate::db;

/// Checkpoint name of the confidence backfill
pub const BACKFILL_MIGRATION_ID: &str = "20260217214100_backfill_new_fields";

pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// A named, checkpointed data migration
#[async_trait]
pub trait DataMigration: Send + Sync {
    /// Sortable identifier, also the checkpoint name
    fn id(&self) -> &str;

    /// Run to completion or until `cancel` fires
    async fn run(&self, cancel: &CancellationToken) -> Result<MigrationCheckpoint>;
}

/// Run migrations in ascending id order, stopping at the first failure
pub async fn run_data_migrations(
    mut migrations: Vec<Arc<dyn DataMigration>>,
    cancel: &CancellationToken,
) -> Result<Vec<MigrationCheckpoint>> {
    migrations.sort_by(|a, b| a.id().cmp(b.id()));

    let mut checkpoints = Vec::with_capacity(migrations.len());
    for migration in migrations {
        if cancel.is_cancelled() {
            info!(migration = migration.id(), "Data migrations cancelled before start");
            break;
        }
        info!(migration = migration.id(), "Running data migration");
        checkpoints.push(migration.run(cancel).await?);
    }
    Ok(checkpoints)
}

/// Start data migrations on a background task
pub fn spawn_data_migrations(migrations: Vec<Arc<dyn DataMigration>>) -> BackfillHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let result = run_data_migrations(migrations, &token).await;
        if let Err(e) = &result {
            error!(error = %e, "Data migration task stopped");
        }
        result
    });

    BackfillHandle { cancel, task }
}

/// Lifecycle of a background migration task
pub struct BackfillHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<Vec<MigrationCheckpoint>>>,
}

impl BackfillHandle {
    /// Ask the task to stop after the current batch
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task and return the final checkpoints
    pub async fn join(self) -> Result<Vec<MigrationCheckpoint>> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Backfill task join error: {}", e)))?
    }
}

/// Batch runner for the confidence backfill
#[derive(Clone)]
pub struct BackfillRunner {
    db: SqlitePool,
    artifacts: Arc<dyn ArtifactStore>,
    detector: Arc<dyn Detector>,
    detector_config: DetectorConfig,
    batch_size: u32,
}

impl BackfillRunner {
    pub fn new(
        db: SqlitePool,
        artifacts: Arc<dyn ArtifactStore>,
        detector: Arc<dyn Detector>,
        detector_config: DetectorConfig,
    ) -> Self {
        Self {
            db,
            artifacts,
            detector,
            detector_config,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run to completion in the current task
    pub async fn run(&self) -> Result<MigrationCheckpoint> {
        self.run_until(&CancellationToken::new()).await
    }

    /// Spawn this backfill alone on a background task
    pub fn spawn(self) -> BackfillHandle {
        spawn_data_migrations(vec![Arc::new(self)])
    }

    async fn run_until(&self, cancel: &CancellationToken) -> Result<MigrationCheckpoint> {
        let name = BACKFILL_MIGRATION_ID;

        if let Some(existing) = db::checkpoints::get(&self.db, name).await? {
            if existing.status == CheckpointStatus::Done {
                debug!(migration = name, "Already done, skipping");
                return Ok(existing);
            }
        }

        let checkpoint = db::checkpoints::start(&self.db, name).await?;
        info!(
            migration = name,
            last_processed_id = ?checkpoint.last_processed_id,
            processed_count = checkpoint.processed_count,
            "Backfill started"
        );

        if let Err(e) = self.drive(checkpoint.last_processed_id, cancel).await {
            let message = e.to_string();
            error!(migration = name, error = %message, "Backfill failed");
            if let Err(mark) = db::checkpoints::mark_failed(&self.db, name, &message).await {
                warn!(migration = name, error = %mark, "Could not record backfill failure");
            }
            return Err(Error::MigrationFailure(message));
        }

        db::checkpoints::get(&self.db, name)
            .await?
            .ok_or_else(|| Error::Internal(format!("Checkpoint {} disappeared", name)))
    }

    /// Batch loop; returns when done or cancelled
    async fn drive(&self, mut last_id: Option<i64>, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!(
                    migration = BACKFILL_MIGRATION_ID,
                    last_processed_id = ?last_id,
                    "Backfill cancelled"
                );
                return Ok(());
            }

            let batch = db::readings::batch_after(&self.db, last_id, self.batch_size).await?;
            let Some(last) = batch.last().map(|r| r.id) else {
                db::checkpoints::mark_done(&self.db, BACKFILL_MIGRATION_ID).await?;
                info!(migration = BACKFILL_MIGRATION_ID, "Backfill done");
                return Ok(());
            };

            for reading in &batch {
                self.rederive(reading).await?;
            }

            db::checkpoints::advance(&self.db, BACKFILL_MIGRATION_ID, last, batch.len() as i64)
                .await?;
            debug!(
                migration = BACKFILL_MIGRATION_ID,
                last_processed_id = last,
                count = batch.len(),
                "Batch committed"
            );
            last_id = Some(last);
        }
    }

    async fn rederive(&self, reading: &Reading) -> Result<()> {
        let Some(handle) = reading.original_artifact else {
            debug!(reading_id = reading.id, "No original artifact, skipping");
            return Ok(());
        };

        let image = match self.artifacts.retrieve(handle).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(Error::NotFound(msg)) => {
                warn!(
                    reading_id = reading.id,
                    handle = %handle,
                    error = %msg,
                    "Original photo missing, skipping"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let output = match detect_blocking(
            Arc::clone(&self.detector),
            image,
            self.detector_config.clone(),
        )
        .await
        {
            Ok(output) => output,
            Err(Error::UnreadableImage(msg)) => {
                warn!(reading_id = reading.id, error = %msg, "Original photo unreadable, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let (confidence_array, score) = assembler::score_only(&output.detections);
        db::readings::update_confidence(&self.db, reading.id, &confidence_array, score).await?;
        Ok(())
    }
}

#[async_trait]
impl DataMigration for BackfillRunner {
    fn id(&self) -> &str {
        BACKFILL_MIGRATION_ID
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<MigrationCheckpoint> {
        self.run_until(cancel).await
    }
}
