//! Reading table queries
//!
//! Raw row access only. Pricing, cascade deletes and not-found semantics
//! live in `services::repository`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use wattbot_common::db::models::NewReading;
use wattbot_common::{ArtifactHandle, ConfidenceEntry, Reading, Result};

use super::{format_date, format_timestamp, parse_date, parse_timestamp};

const SELECT_COLUMNS: &str = r#"
    SELECT id, captured_value, billing_date, modified_at, price,
           original_artifact, annotated_artifact, label_artifact,
           file_name, conf_array, score
    FROM readings
"#;

fn row_to_reading(row: &SqliteRow) -> Result<Reading> {
    let billing_date: String = row.try_get("billing_date")?;
    let modified_at: String = row.try_get("modified_at")?;
    let conf_array: String = row.try_get("conf_array")?;
    let confidence_array: Vec<ConfidenceEntry> = serde_json::from_str(&conf_array)?;

    Ok(Reading {
        id: row.try_get("id")?,
        captured_value: row.try_get("captured_value")?,
        billing_date: parse_date(&billing_date, "billing_date")?,
        modified_at: parse_timestamp(&modified_at, "modified_at")?,
        price: row.try_get("price")?,
        original_artifact: ArtifactHandle::from_column(row.try_get("original_artifact")?)?,
        annotated_artifact: ArtifactHandle::from_column(row.try_get("annotated_artifact")?)?,
        label_artifact: ArtifactHandle::from_column(row.try_get("label_artifact")?)?,
        file_name: row.try_get("file_name")?,
        confidence_array,
        score: row.try_get("score")?,
    })
}

fn rows_to_readings(rows: Vec<SqliteRow>) -> Result<Vec<Reading>> {
    rows.iter().map(row_to_reading).collect()
}

/// Insert a reading and return its assigned id
pub async fn insert(
    pool: &SqlitePool,
    draft: &NewReading,
    price: f64,
    modified_at: DateTime<Utc>,
) -> Result<i64> {
    let conf_array = serde_json::to_string(&draft.confidence_array)?;

    let result = sqlx::query(
        r#"
        INSERT INTO readings (
            captured_value, billing_date, modified_at, price,
            original_artifact, annotated_artifact, label_artifact,
            file_name, conf_array, score
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.captured_value)
    .bind(format_date(draft.billing_date))
    .bind(format_timestamp(modified_at))
    .bind(price)
    .bind(draft.original_artifact.map(|h| h.to_string()))
    .bind(draft.annotated_artifact.map(|h| h.to_string()))
    .bind(draft.label_artifact.map(|h| h.to_string()))
    .bind(&draft.file_name)
    .bind(conf_array)
    .bind(draft.score)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Reading>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(row_to_reading).transpose()
}

/// Reading with the greatest billing date (latest insert wins ties)
pub async fn latest(pool: &SqlitePool) -> Result<Option<Reading>> {
    let sql = format!("{} ORDER BY billing_date DESC, id DESC LIMIT 1", SELECT_COLUMNS);
    let row = sqlx::query(&sql).fetch_optional(pool).await?;
    row.as_ref().map(row_to_reading).transpose()
}

/// Latest reading billed strictly before `date`, ignoring `exclude_id`
pub async fn latest_before(
    pool: &SqlitePool,
    date: NaiveDate,
    exclude_id: i64,
) -> Result<Option<Reading>> {
    let sql = format!(
        "{} WHERE billing_date < ? AND id != ? ORDER BY billing_date DESC, id DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(format_date(date))
        .bind(exclude_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_reading).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Reading>> {
    let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows_to_readings(rows)
}

/// Next batch of readings with id greater than `after`, ascending by id
pub async fn batch_after(pool: &SqlitePool, after: Option<i64>, limit: u32) -> Result<Vec<Reading>> {
    let sql = format!("{} WHERE id > ? ORDER BY id ASC LIMIT ?", SELECT_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(after.unwrap_or(0))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;
    rows_to_readings(rows)
}

/// Overwrite the editable fields; returns rows affected
pub async fn update_values(
    pool: &SqlitePool,
    id: i64,
    captured_value: f64,
    billing_date: NaiveDate,
    price: f64,
    modified_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE readings
        SET captured_value = ?, billing_date = ?, price = ?, modified_at = ?
        WHERE id = ?
        "#,
    )
    .bind(captured_value)
    .bind(format_date(billing_date))
    .bind(price)
    .bind(format_timestamp(modified_at))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Overwrite the derived confidence fields only; returns rows affected
pub async fn update_confidence(
    pool: &SqlitePool,
    id: i64,
    confidence_array: &[ConfidenceEntry],
    score: f64,
) -> Result<u64> {
    let conf_array = serde_json::to_string(confidence_array)?;

    let result = sqlx::query("UPDATE readings SET conf_array = ?, score = ? WHERE id = ?")
        .bind(conf_array)
        .bind(score)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Delete a reading row; returns rows affected
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM readings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
