//! Data migration status

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use wattbot_common::MigrationCheckpoint;

use crate::{db, ApiError, ApiResult, AppState};

/// GET /migrations/:name
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MigrationCheckpoint>> {
    db::checkpoints::get(&state.db, &name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Migration {}", name)))
}

pub fn migration_routes() -> Router<AppState> {
    Router::new().route("/migrations/:name", get(get_checkpoint))
}
