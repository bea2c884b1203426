//! Data migration checkpoint persistence
//!
//! One row per migration name in `data_migrations`. Rows are created on the
//! first run and updated after every batch; they are never deleted.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use wattbot_common::{CheckpointStatus, Error, MigrationCheckpoint, Result};

use super::{format_timestamp, parse_optional_timestamp};

fn row_to_checkpoint(row: &SqliteRow) -> Result<MigrationCheckpoint> {
    let status: String = row.try_get("status")?;

    Ok(MigrationCheckpoint {
        name: row.try_get("name")?,
        status: status.parse()?,
        last_processed_id: row.try_get("last_processed_id")?,
        processed_count: row.try_get("processed_count")?,
        started_at: parse_optional_timestamp(row.try_get("started_at")?, "started_at")?,
        finished_at: parse_optional_timestamp(row.try_get("finished_at")?, "finished_at")?,
        last_error: row.try_get("last_error")?,
    })
}

pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<MigrationCheckpoint>> {
    let row = sqlx::query(
        r#"
        SELECT name, status, last_processed_id, processed_count, started_at, finished_at, last_error
        FROM data_migrations WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_checkpoint).transpose()
}

/// Create the checkpoint or flip an existing one back to running
///
/// Progress (`last_processed_id`, `processed_count`) from earlier attempts
/// is preserved so the job resumes after the last committed batch.
pub async fn start(pool: &SqlitePool, name: &str) -> Result<MigrationCheckpoint> {
    sqlx::query(
        r#"
        INSERT INTO data_migrations (name, status, last_processed_id, processed_count, started_at)
        VALUES (?, ?, NULL, 0, ?)
        ON CONFLICT(name) DO UPDATE SET
            status = excluded.status,
            finished_at = NULL
        "#,
    )
    .bind(name)
    .bind(CheckpointStatus::Running.as_str())
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await?;

    get(pool, name)
        .await?
        .ok_or_else(|| Error::Internal(format!("Checkpoint {} missing after start", name)))
}

/// Record a committed batch in one statement
pub async fn advance(pool: &SqlitePool, name: &str, last_id: i64, batch_count: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE data_migrations
        SET last_processed_id = ?, processed_count = processed_count + ?
        WHERE name = ?
        "#,
    )
    .bind(last_id)
    .bind(batch_count)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_done(pool: &SqlitePool, name: &str) -> Result<()> {
    sqlx::query("UPDATE data_migrations SET status = ?, finished_at = ? WHERE name = ?")
        .bind(CheckpointStatus::Done.as_str())
        .bind(format_timestamp(Utc::now()))
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, name: &str, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE data_migrations SET status = ?, last_error = ?, finished_at = ? WHERE name = ?",
    )
    .bind(CheckpointStatus::Failed.as_str())
    .bind(error)
    .bind(format_timestamp(Utc::now()))
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattbot_common::db::init_in_memory_database;

    #[tokio::test]
    async fn test_start_creates_running_checkpoint() {
        let pool = init_in_memory_database().await.unwrap();

        assert!(get(&pool, "m1").await.unwrap().is_none());
        let cp = start(&pool, "m1").await.unwrap();

        assert_eq!(cp.status, CheckpointStatus::Running);
        assert_eq!(cp.last_processed_id, None);
        assert_eq!(cp.processed_count, 0);
        assert!(cp.started_at.is_some());
    }

    #[tokio::test]
    async fn test_restart_after_failure_keeps_progress() {
        let pool = init_in_memory_database().await.unwrap();
        start(&pool, "m1").await.unwrap();
        advance(&pool, "m1", 10, 10).await.unwrap();
        mark_failed(&pool, "m1", "detector crashed").await.unwrap();

        let failed = get(&pool, "m1").await.unwrap().unwrap();
        assert_eq!(failed.status, CheckpointStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("detector crashed"));

        let resumed = start(&pool, "m1").await.unwrap();
        assert_eq!(resumed.status, CheckpointStatus::Running);
        assert_eq!(resumed.last_processed_id, Some(10));
        assert_eq!(resumed.processed_count, 10);
        assert_eq!(resumed.started_at, failed.started_at);
        assert!(resumed.finished_at.is_none());
    }

    #[tokio::test]
    async fn test_advance_accumulates_count() {
        let pool = init_in_memory_database().await.unwrap();
        start(&pool, "m1").await.unwrap();
        advance(&pool, "m1", 10, 10).await.unwrap();
        advance(&pool, "m1", 14, 4).await.unwrap();
        mark_done(&pool, "m1").await.unwrap();

        let cp = get(&pool, "m1").await.unwrap().unwrap();
        assert_eq!(cp.status, CheckpointStatus::Done);
        assert_eq!(cp.last_processed_id, Some(14));
        assert_eq!(cp.processed_count, 14);
        assert!(cp.finished_at.is_some());
    }
}
