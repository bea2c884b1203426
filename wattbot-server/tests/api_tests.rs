//! HTTP boundary: routing and error status mapping

mod helpers;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use helpers::{add_price, date, seed_reading, test_pool, MemoryArtifactStore, ScriptedDetector};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;
use wattbot_server::services::DetectorConfig;
use wattbot_server::{build_router, AppState};

const BOUNDARY: &str = "wattbot-test-boundary";

fn app(pool: &SqlitePool, detector: ScriptedDetector) -> Router {
    let state = AppState::new(
        pool.clone(),
        MemoryArtifactStore::new(),
        Arc::new(detector),
        DetectorConfig::default(),
    );
    build_router(state)
}

fn upload_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/readings")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let pool = test_pool().await;
    let response = app(&pool, ScriptedDetector::default())
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "wattbot-server");
}

#[tokio::test]
async fn test_missing_reading_is_404() {
    let pool = test_pool().await;
    let response = app(&pool, ScriptedDetector::default())
        .oneshot(get("/readings/999"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_latest_on_empty_ledger_is_404() {
    let pool = test_pool().await;
    let response = app(&pool, ScriptedDetector::default())
        .oneshot(get("/readings/latest"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_creates_reading() {
    let pool = test_pool().await;
    add_price(&pool, 0.25, date(2020, 1, 1)).await;

    let response = app(&pool, ScriptedDetector::reading("1234"))
        .oneshot(upload_request("file", "meter.jpg", b"jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["captured_value"], 1234.0);
    assert_eq!(body["price"], 308.5);
    assert_eq!(body["file_name"], "meter.jpg");
    assert!(body["original_artifact"].is_string());
}

#[tokio::test]
async fn test_upload_unreadable_is_422() {
    let pool = test_pool().await;
    add_price(&pool, 0.25, date(2020, 1, 1)).await;

    let response = app(&pool, ScriptedDetector::reading("ab"))
        .oneshot(upload_request("file", "meter.jpg", b"jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NO_NUMBER_DETECTED");
}

#[tokio::test]
async fn test_upload_not_above_latest_is_409() {
    let pool = test_pool().await;
    add_price(&pool, 0.25, date(2020, 1, 1)).await;
    seed_reading(&pool, 5000.0, date(2020, 1, 31), None).await;

    let response = app(&pool, ScriptedDetector::reading("1234"))
        .oneshot(upload_request("file", "meter.jpg", b"jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "DUPLICATE_PERIOD");
}

#[tokio::test]
async fn test_upload_without_price_is_422() {
    let pool = test_pool().await;

    let response = app(&pool, ScriptedDetector::reading("1234"))
        .oneshot(upload_request("file", "meter.jpg", b"jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NO_PRICE_FOUND");
}

#[tokio::test]
async fn test_upload_without_file_field_is_400() {
    let pool = test_pool().await;

    let response = app(&pool, ScriptedDetector::reading("1"))
        .oneshot(upload_request("photo", "meter.jpg", b"jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_reading() {
    let pool = test_pool().await;
    add_price(&pool, 1.0, date(2020, 1, 1)).await;
    seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let id = seed_reading(&pool, 150.0, date(2024, 2, 29), None).await;
    let app = app(&pool, ScriptedDetector::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/readings/{}", id),
            json!({"captured_value": 130.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["price"], 30.0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/readings/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/readings/{}", id),
            json!({"captured_value": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_price_crud() {
    let pool = test_pool().await;
    let app = app(&pool, ScriptedDetector::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/prices",
            json!({"price_per_unit": 0.31, "effective_date": "2024-01-01"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/prices",
            json!({"price_per_unit": -1.0, "effective_date": "2024-01-01"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(get("/prices")).await.unwrap();
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/prices/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/prices/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_settings_defaults_and_update() {
    let pool = test_pool().await;
    let app = app(&pool, ScriptedDetector::default());

    let response = app.clone().oneshot(get("/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["calculate_pricing"], true);
    assert_eq!(body["currency"], "usd");
    assert_eq!(body["dark_mode_preference"], "auto");

    let response = app
        .oneshot(json_request(
            "PUT",
            "/settings",
            json!({"calculate_pricing": false, "currency": "eur"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["calculate_pricing"], false);
    assert_eq!(body["currency"], "eur");
}

#[tokio::test]
async fn test_artifact_download_and_unknown_handle() {
    let pool = test_pool().await;
    add_price(&pool, 0.25, date(2020, 1, 1)).await;
    let app = app(&pool, ScriptedDetector::reading("42"));

    let response = app
        .clone()
        .oneshot(upload_request("file", "meter.jpg", b"jpeg-bytes"))
        .await
        .unwrap();
    let reading = body_json(response).await;
    let handle = reading["original_artifact"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/artifacts/{}", handle)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "inline; filename=\"meter.jpg\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"jpeg-bytes");

    let response = app.oneshot(get("/artifacts/not-a-handle")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_corrupt_stored_handle_is_500_not_404() {
    let pool = test_pool().await;
    let id = seed_reading(&pool, 10.0, date(2024, 1, 31), None).await;
    sqlx::query("UPDATE readings SET label_artifact = 'not-a-uuid' WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let response = app(&pool, ScriptedDetector::default())
        .oneshot(get(&format!("/readings/{}", id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_migration_status_unknown_is_404() {
    let pool = test_pool().await;
    let response = app(&pool, ScriptedDetector::default())
        .oneshot(get("/migrations/20260217214100_backfill_new_fields"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
