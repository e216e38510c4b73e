use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::api_key::ApiKey;
use crate::db;
use crate::error::AppError;
use crate::models::{QueueEntry, QueueStatus};
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
}

impl From<QueueEntry> for QueueItem {
    fn from(entry: QueueEntry) -> Self {
        Self {
            id: entry.id,
            created_at: entry.created_at,
            status: entry.status,
            attempts: entry.attempts,
            error_message: entry.error_message,
            printer_name: entry.printer_name,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemDetail {
    #[serde(flatten)]
    pub item: QueueItem,
    pub updated_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub async fn list(
    _: ApiKey,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueueItem>>, AppError> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(QueueStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid status: {raw}. Use: pending, processing, completed, failed"
            ))
        })?),
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let entries = db::print_queue::get_all(&state.pool, status, limit).await?;
    Ok(Json(entries.into_iter().map(QueueItem::from).collect()))
}

pub async fn get(
    _: ApiKey,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueItemDetail>, AppError> {
    let entry = db::print_queue::get_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Queue entry not found".to_string()))?;

    let updated_at = entry.updated_at;
    let payload = entry.payload.clone();

    Ok(Json(QueueItemDetail {
        item: QueueItem::from(entry),
        updated_at,
        payload,
    }))
}

pub async fn process(
    _: ApiKey,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let processed = state.dispatcher.process_now().await?;

    Ok(Json(json!({
        "success": true,
        "processed": processed,
        "message": format!("{processed} queued requests printed"),
    })))
}
