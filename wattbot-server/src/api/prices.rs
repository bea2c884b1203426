//! Price entry endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;
use wattbot_common::db::models::PriceEntryInput;
use wattbot_common::PriceEntry;

use crate::{db, ApiError, ApiResult, AppState};

fn validate(input: &PriceEntryInput) -> ApiResult<()> {
    if !input.price_per_unit.is_finite() || input.price_per_unit < 0.0 {
        return Err(ApiError::BadRequest(
            "price_per_unit must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

/// GET /prices
pub async fn list_prices(State(state): State<AppState>) -> ApiResult<Json<Vec<PriceEntry>>> {
    Ok(Json(db::prices::list(&state.db).await?))
}

/// POST /prices
pub async fn create_price(
    State(state): State<AppState>,
    Json(input): Json<PriceEntryInput>,
) -> ApiResult<(StatusCode, Json<PriceEntry>)> {
    validate(&input)?;
    let entry = db::prices::insert(&state.db, &input).await?;
    info!(
        price_id = entry.id,
        price_per_unit = entry.price_per_unit,
        effective_date = %entry.effective_date,
        "Price entry created"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /prices/:id
pub async fn get_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PriceEntry>> {
    db::prices::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Price entry {}", id)))
}

/// PUT /prices/:id
pub async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<PriceEntryInput>,
) -> ApiResult<Json<PriceEntry>> {
    validate(&input)?;
    let entry = db::prices::update(&state.db, id, &input).await?;
    info!(price_id = id, "Price entry updated");
    Ok(Json(entry))
}

/// DELETE /prices/:id
pub async fn delete_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    db::prices::delete(&state.db, id).await?;
    info!(price_id = id, "Price entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build price routes
pub fn price_routes() -> Router<AppState> {
    Router::new()
        .route("/prices", get(list_prices).post(create_price))
        .route(
            "/prices/:id",
            get(get_price).put(update_price).delete(delete_price),
        )
}
