use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{QueueEntry, QueueStats, QueueStatus};

/// Fixed-width RFC 3339 so timestamps sort correctly as TEXT.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert a new pending entry. The payload is stored exactly as given.
pub async fn add(
    pool: &SqlitePool,
    payload: &serde_json::Value,
    printer_name: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::now_v7();
    let now = timestamp(Utc::now());
    let payload = serde_json::to_string(payload).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO print_queue (id, created_at, updated_at, status, payload, attempts, printer_name)
         VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(id)
    .bind(&now)
    .bind(&now)
    .bind(QueueStatus::Pending)
    .bind(payload)
    .bind(printer_name)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Oldest pending entries first.
pub async fn get_pending(pool: &SqlitePool, limit: i64) -> Result<Vec<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM print_queue
         WHERE status = ?
         ORDER BY created_at ASC, rowid ASC
         LIMIT ?",
    )
    .bind(QueueStatus::Pending)
    .bind(limit.max(0))
    .fetch_all(pool)
    .await
}

pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>("SELECT * FROM print_queue WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Set the status, overwrite the error message and bump `attempts`.
///
/// Returns false when no entry has this id.
pub async fn update_status(
    pool: &SqlitePool,
    id: Uuid,
    status: QueueStatus,
    error_message: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE print_queue
         SET status = ?, updated_at = ?, error_message = ?, attempts = attempts + 1
         WHERE id = ?",
    )
    .bind(status)
    .bind(timestamp(Utc::now()))
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Like [`update_status`], but only applies while the entry is still in `expected`.
/// Returns the new `attempts` value, or `None` if the entry was not in `expected`.
///
/// The check and the write are one statement, so of two concurrent callers
/// moving the same entry out of `expected` exactly one gets `Some`.
pub async fn update_status_if(
    pool: &SqlitePool,
    id: Uuid,
    expected: QueueStatus,
    status: QueueStatus,
    error_message: Option<&str>,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE print_queue
         SET status = ?, updated_at = ?, error_message = ?, attempts = attempts + 1
         WHERE id = ? AND status = ?
         RETURNING attempts",
    )
    .bind(status)
    .bind(timestamp(Utc::now()))
    .bind(error_message)
    .bind(id)
    .bind(expected)
    .fetch_optional(pool)
    .await
}

/// Newest entries first, optionally restricted to one status.
pub async fn get_all(
    pool: &SqlitePool,
    status: Option<QueueStatus>,
    limit: i64,
) -> Result<Vec<QueueEntry>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, QueueEntry>(
                "SELECT * FROM print_queue
                 WHERE status = ?
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?",
            )
            .bind(status)
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, QueueEntry>(
                "SELECT * FROM print_queue
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?",
            )
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn get_stats(pool: &SqlitePool) -> Result<QueueStats, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM print_queue GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = QueueStats::default();
    for (status, count) in rows {
        match QueueStatus::parse(&status) {
            Some(status) => stats.record(status, count),
            None => tracing::warn!("Ignoring {count} queue entries with unknown status '{status}'"),
        }
    }
    Ok(stats)
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM print_queue")
        .fetch_one(pool)
        .await
}

/// Ids of entries currently in `status`, oldest first.
pub async fn ids_with_status(
    pool: &SqlitePool,
    status: QueueStatus,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM print_queue WHERE status = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(status)
    .fetch_all(pool)
    .await
}
