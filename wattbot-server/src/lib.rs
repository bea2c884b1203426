//! wattbot-server library interface
//!
//! Exposes the services and router for the binary and integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::services::{
    ArtifactStore, Detector, DetectorConfig, IngestService, PricingEngine, ReadingRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub repository: ReadingRepository,
    pub ingest: IngestService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services around an open pool
    pub fn new(
        db: SqlitePool,
        artifacts: Arc<dyn ArtifactStore>,
        detector: Arc<dyn Detector>,
        detector_config: DetectorConfig,
    ) -> Self {
        let pricing = PricingEngine::new(db.clone());
        let repository = ReadingRepository::new(db.clone(), Arc::clone(&artifacts), pricing);
        let ingest = IngestService::new(detector, detector_config, artifacts, repository.clone());

        Self {
            db,
            repository,
            ingest,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::reading_routes())
        .merge(api::price_routes())
        .merge(api::settings_routes())
        .merge(api::migration_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
