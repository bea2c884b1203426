//! Settings endpoints

use axum::{extract::State, routing::get, Json, Router};
use tracing::info;
use wattbot_common::db::models::SettingsUpdate;
use wattbot_common::Settings;

use crate::{db, ApiError, ApiResult, AppState};

/// GET /settings
///
/// Creates the settings row with defaults on first access.
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(db::settings::get_settings(&state.db).await?))
}

/// PUT /settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
    if update.currency.trim().is_empty() {
        return Err(ApiError::BadRequest("currency cannot be empty".to_string()));
    }

    let settings = db::settings::update_settings(&state.db, &update).await?;
    info!(
        calculate_pricing = settings.calculate_pricing,
        currency = %settings.currency,
        "Settings updated"
    );
    Ok(Json(settings))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}
