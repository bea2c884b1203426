//! Settings singleton access
//!
//! The row with `id = 1` is created with defaults on first read.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use wattbot_common::db::models::{DarkModePreference, SettingsUpdate};
use wattbot_common::{Error, Result, Settings};

use super::{format_timestamp, parse_timestamp};

fn row_to_settings(row: &SqliteRow) -> Result<Settings> {
    let dark_mode: String = row.try_get("dark_mode_preference")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Settings {
        calculate_pricing: row.try_get::<i64, _>("calculate_pricing")? != 0,
        currency: row.try_get("currency")?,
        dark_mode_preference: DarkModePreference::from_db(&dark_mode),
        debug_mode: row.try_get::<i64, _>("debug_mode")? != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Read the settings row, creating it with defaults if absent
pub async fn get_settings(pool: &SqlitePool) -> Result<Settings> {
    let now = format_timestamp(Utc::now());
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO settings (id, calculate_pricing, currency, dark_mode_preference, debug_mode, created_at, updated_at)
        VALUES (1, 1, 'usd', 'auto', 0, ?, ?)
        "#,
    )
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        info!("Settings row initialized with defaults");
    }

    let row = sqlx::query(
        r#"
        SELECT calculate_pricing, currency, dark_mode_preference, debug_mode, created_at, updated_at
        FROM settings WHERE id = 1
        "#,
    )
    .fetch_one(pool)
    .await?;

    row_to_settings(&row)
}

/// Replace the user-editable settings fields
pub async fn update_settings(pool: &SqlitePool, update: &SettingsUpdate) -> Result<Settings> {
    // Guarantees the row exists so the update below cannot miss
    get_settings(pool).await?;

    let result = sqlx::query(
        r#"
        UPDATE settings
        SET calculate_pricing = ?, currency = ?, dark_mode_preference = ?, debug_mode = ?, updated_at = ?
        WHERE id = 1
        "#,
    )
    .bind(update.calculate_pricing)
    .bind(&update.currency)
    .bind(update.dark_mode_preference.as_str())
    .bind(update.debug_mode)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Settings".to_string()));
    }

    get_settings(pool).await
}
