//! Ingestion pipeline
//!
//! image -> detector -> assembler -> 3 artifacts -> repository.create

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use wattbot_common::db::models::NewReading;
use wattbot_common::{ArtifactHandle, Reading, Result};

use super::artifact_store::ArtifactStore;
use super::assembler::{self, AssembledReading};
use super::detector::{detect_blocking, Detector, DetectorConfig, DetectorOutput};
use super::repository::ReadingRepository;

#[derive(Clone)]
pub struct IngestService {
    detector: Arc<dyn Detector>,
    detector_config: DetectorConfig,
    artifacts: Arc<dyn ArtifactStore>,
    repository: ReadingRepository,
}

impl IngestService {
    pub fn new(
        detector: Arc<dyn Detector>,
        detector_config: DetectorConfig,
        artifacts: Arc<dyn ArtifactStore>,
        repository: ReadingRepository,
    ) -> Self {
        Self {
            detector,
            detector_config,
            artifacts,
            repository,
        }
    }

    /// Turn an uploaded meter photo into a stored, priced reading
    pub async fn ingest(&self, image: Bytes, file_name: &str) -> Result<Reading> {
        let size = image.len();
        let output = detect_blocking(
            Arc::clone(&self.detector),
            image.clone(),
            self.detector_config.clone(),
        )
        .await?;

        // Nothing is stored for an unreadable photo
        let assembled = assembler::assemble(&output.detections)?;
        info!(
            file_name,
            size,
            value = assembled.value,
            score = assembled.score,
            "Meter value recognized"
        );

        let mut stored = Vec::with_capacity(3);
        let result = self
            .store_and_create(&mut stored, &image, &output, file_name, assembled)
            .await;

        if let Err(e) = &result {
            warn!(
                file_name,
                error = %e,
                artifacts = stored.len(),
                "Ingestion failed, removing stored artifacts"
            );
            for handle in stored {
                if let Err(cleanup) = self.artifacts.delete(handle).await {
                    warn!(handle = %handle, error = %cleanup, "Artifact cleanup failed");
                }
            }
        }

        result
    }

    /// Store the three artifacts, recording each handle in `stored` as it lands
    async fn store_and_create(
        &self,
        stored: &mut Vec<ArtifactHandle>,
        original: &[u8],
        output: &DetectorOutput,
        file_name: &str,
        assembled: AssembledReading,
    ) -> Result<Reading> {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("reading");

        let original_artifact = self.artifacts.store(original, file_name).await?;
        stored.push(original_artifact);
        let annotated_artifact = self
            .artifacts
            .store(&output.annotated_image, &format!("{}.jpg", stem))
            .await?;
        stored.push(annotated_artifact);
        let label_artifact = self
            .artifacts
            .store(&output.label_data, &format!("{}.txt", stem))
            .await?;
        stored.push(label_artifact);

        let draft = NewReading {
            captured_value: assembled.value,
            billing_date: Utc::now().date_naive(),
            original_artifact: Some(original_artifact),
            annotated_artifact: Some(annotated_artifact),
            label_artifact: Some(label_artifact),
            file_name: file_name.to_string(),
            confidence_array: assembled.confidence_array,
            score: assembled.score,
        };

        self.repository.create(draft).await
    }
}
