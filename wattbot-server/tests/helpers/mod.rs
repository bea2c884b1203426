//! Shared fixtures and test doubles for wattbot-server integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use wattbot_common::db::models::{NewReading, PriceEntryInput};
use wattbot_common::{ArtifactHandle, ConfidenceEntry, Detection, Error, Result};
use wattbot_server::services::{
    ArtifactMetadata, ArtifactStore, Detector, DetectorConfig, DetectorOutput,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn test_pool() -> SqlitePool {
    wattbot_common::db::init_in_memory_database().await.unwrap()
}

pub async fn add_price(pool: &SqlitePool, price_per_unit: f64, effective: NaiveDate) {
    wattbot_server::db::prices::insert(
        pool,
        &PriceEntryInput {
            price_per_unit,
            effective_date: effective,
            is_default: false,
        },
    )
    .await
    .unwrap();
}

pub async fn disable_pricing(pool: &SqlitePool) {
    wattbot_server::db::settings::get_settings(pool).await.unwrap();
    sqlx::query("UPDATE settings SET calculate_pricing = 0 WHERE id = 1")
        .execute(pool)
        .await
        .unwrap();
}

/// Insert a reading row directly, bypassing pricing
pub async fn seed_reading(
    pool: &SqlitePool,
    value: f64,
    billing_date: NaiveDate,
    original: Option<ArtifactHandle>,
) -> i64 {
    let draft = NewReading {
        captured_value: value,
        billing_date,
        original_artifact: original,
        annotated_artifact: None,
        label_artifact: None,
        file_name: "seed.jpg".to_string(),
        confidence_array: Vec::new(),
        score: 0.0,
    };
    wattbot_server::db::readings::insert(pool, &draft, 0.0, Utc::now())
        .await
        .unwrap()
}

pub fn draft_with_artifacts(value: f64, billing_date: NaiveDate) -> NewReading {
    NewReading {
        captured_value: value,
        billing_date,
        original_artifact: Some(ArtifactHandle::generate()),
        annotated_artifact: Some(ArtifactHandle::generate()),
        label_artifact: Some(ArtifactHandle::generate()),
        file_name: "meter.jpg".to_string(),
        confidence_array: vec![ConfidenceEntry {
            symbol: value.to_string(),
            confidence: 0.9,
        }],
        score: 0.9,
    }
}

/// In-memory artifact store that counts calls
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<ArtifactHandle, (ArtifactMetadata, Vec<u8>)>>,
    stores: AtomicUsize,
    retrieves: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn store_calls(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieves.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .blobs
            .lock()
            .unwrap()
            .values()
            .map(|(meta, _)| meta.display_name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, bytes: &[u8], display_name: &str) -> Result<ArtifactHandle> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        let handle = ArtifactHandle::generate();
        let meta = ArtifactMetadata {
            display_name: display_name.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        };
        self.blobs
            .lock()
            .unwrap()
            .insert(handle, (meta, bytes.to_vec()));
        Ok(handle)
    }

    async fn retrieve(&self, handle: ArtifactHandle) -> Result<Vec<u8>> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .get(&handle)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("Artifact {}", handle)))
    }

    async fn delete(&self, handle: ArtifactHandle) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Artifact {}", handle)))
    }

    async fn metadata(&self, handle: ArtifactHandle) -> Result<ArtifactMetadata> {
        self.blobs
            .lock()
            .unwrap()
            .get(&handle)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| Error::NotFound(format!("Artifact {}", handle)))
    }
}

/// Detector returning fixed detections, with call counting and fault injection
#[derive(Default)]
pub struct ScriptedDetector {
    detections: Vec<Detection>,
    calls: AtomicUsize,
    /// 1-based call number from which every call fails
    fail_from_call: Option<usize>,
    /// Cancelled on the first call
    cancel_on_call: Option<CancellationToken>,
    /// Image bytes reported as undecodable
    rejects: Option<Vec<u8>>,
}

impl ScriptedDetector {
    /// Detector reading the digits of `value` left to right
    pub fn reading(value: &str) -> Self {
        let detections = value
            .chars()
            .enumerate()
            .map(|(i, c)| Detection::new(i as f64 * 10.0, c.to_string(), 0.9))
            .collect();
        Self {
            detections,
            ..Default::default()
        }
    }

    pub fn failing_from(mut self, call: usize) -> Self {
        self.fail_from_call = Some(call);
        self
    }

    pub fn rejecting(mut self, image: &[u8]) -> Self {
        self.rejects = Some(image.to_vec());
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, image: &[u8], _config: &DetectorConfig) -> Result<DetectorOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        if self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(Error::Detector(format!("simulated crash on call {}", call)));
        }
        if self.rejects.as_deref() == Some(image) {
            return Err(Error::UnreadableImage("cannot identify image file".to_string()));
        }

        Ok(DetectorOutput {
            detections: self.detections.clone(),
            annotated_image: [b"annotated:".as_slice(), image].concat(),
            label_data: b"0 0.5 0.5 0.1 0.1".to_vec(),
        })
    }
}
