//! Reading and artifact endpoints

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::info;
use wattbot_common::db::models::ReadingPatch;
use wattbot_common::{ArtifactHandle, Reading};

use crate::{ApiError, ApiResult, AppState};

/// Upper bound for an uploaded meter photo
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Multipart field carrying the image
const UPLOAD_FIELD: &str = "file";

/// POST /readings
///
/// Multipart upload with a `file` field. Returns the stored reading.
/// 422 when no number can be read, 409 when the value does not exceed
/// the latest reading.
pub async fn create_reading(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Reading>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload.jpg")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        info!(file_name = %file_name, size = bytes.len(), "Meter photo received");
        let reading = state.ingest.ingest(bytes, &file_name).await?;
        return Ok(Json(reading));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

/// GET /readings
pub async fn list_readings(State(state): State<AppState>) -> ApiResult<Json<Vec<Reading>>> {
    Ok(Json(state.repository.get_all().await?))
}

/// GET /readings/latest
pub async fn latest_reading(State(state): State<AppState>) -> ApiResult<Json<Reading>> {
    Ok(Json(state.repository.get_latest().await?))
}

/// GET /readings/:id
pub async fn get_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Reading>> {
    Ok(Json(state.repository.get(id).await?))
}

/// PUT /readings/:id
///
/// Body: `{"captured_value": 123.4, "billing_date": "2024-03-31"}`, both
/// optional. The price is recomputed.
pub async fn update_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ReadingPatch>,
) -> ApiResult<Json<Reading>> {
    Ok(Json(state.repository.update(id, patch).await?))
}

/// DELETE /readings/:id
pub async fn delete_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn content_type_for(display_name: &str) -> &'static str {
    let extension = std::path::Path::new(display_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// GET /artifacts/:handle
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> ApiResult<Response> {
    let handle: ArtifactHandle = handle.parse()?;
    let (metadata, bytes) = state.repository.artifact(handle).await?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        metadata.display_name.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&metadata.display_name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Build reading routes
pub fn reading_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/readings",
            get(list_readings)
                .post(create_reading)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/readings/latest", get(latest_reading))
        .route(
            "/readings/:id",
            get(get_reading).put(update_reading).delete(delete_reading),
        )
        .route("/artifacts/:handle", get(download_artifact))
}
