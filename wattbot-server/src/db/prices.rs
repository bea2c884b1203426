//! Price entry queries

use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use wattbot_common::db::models::PriceEntryInput;
use wattbot_common::{Error, PriceEntry, Result};

use super::{format_date, format_timestamp, parse_date, parse_timestamp};

const SELECT_COLUMNS: &str = r#"
    SELECT id, price_per_unit, effective_date, created_at, updated_at, is_default
    FROM price_entries
"#;

fn row_to_price(row: &SqliteRow) -> Result<PriceEntry> {
    let effective_date: String = row.try_get("effective_date")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(PriceEntry {
        id: row.try_get("id")?,
        price_per_unit: row.try_get("price_per_unit")?,
        effective_date: parse_date(&effective_date, "effective_date")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        is_default: row.try_get::<i64, _>("is_default")? != 0,
    })
}

pub async fn insert(pool: &SqlitePool, input: &PriceEntryInput) -> Result<PriceEntry> {
    let now = format_timestamp(Utc::now());

    let result = sqlx::query(
        r#"
        INSERT INTO price_entries (price_per_unit, effective_date, created_at, updated_at, is_default)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.price_per_unit)
    .bind(format_date(input.effective_date))
    .bind(&now)
    .bind(&now)
    .bind(input.is_default)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    get(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Price entry {} vanished after insert", id)))
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<PriceEntry>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(row_to_price).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<PriceEntry>> {
    let sql = format!("{} ORDER BY effective_date, id", SELECT_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(row_to_price).collect()
}

/// Entry with the latest effective date overall
pub async fn latest(pool: &SqlitePool) -> Result<Option<PriceEntry>> {
    let sql = format!("{} ORDER BY effective_date DESC, id DESC LIMIT 1", SELECT_COLUMNS);
    let row = sqlx::query(&sql).fetch_optional(pool).await?;
    row.as_ref().map(row_to_price).transpose()
}

/// Entry in force on `date`: latest effective date not after it
pub async fn latest_on_or_before(pool: &SqlitePool, date: NaiveDate) -> Result<Option<PriceEntry>> {
    let sql = format!(
        "{} WHERE effective_date <= ? ORDER BY effective_date DESC, id DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(format_date(date))
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_price).transpose()
}

/// Update an entry; `NotFound` when no row matches
pub async fn update(pool: &SqlitePool, id: i64, input: &PriceEntryInput) -> Result<PriceEntry> {
    let result = sqlx::query(
        r#"
        UPDATE price_entries
        SET price_per_unit = ?, effective_date = ?, is_default = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.price_per_unit)
    .bind(format_date(input.effective_date))
    .bind(input.is_default)
    .bind(format_timestamp(Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Price entry {}", id)));
    }

    get(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Price entry {}", id)))
}

/// Delete an entry; `NotFound` when no row matches
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM price_entries WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Price entry {}", id)));
    }

    Ok(())
}
