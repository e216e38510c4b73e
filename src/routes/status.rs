use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::auth::api_key::ApiKey;
use crate::db;
use crate::error::AppError;
use crate::state::SharedState;

pub async fn status(
    _: ApiKey,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let printer_name = state.deliverer.resolve_device(None).await;
    let printer_available = match printer_name.as_deref() {
        Some(device) => state.deliverer.driver().is_available(device).await,
        None => false,
    };
    let queue_stats = db::print_queue::get_stats(&state.pool).await?;

    Ok(Json(json!({
        "status": "online",
        "printerAvailable": printer_available,
        "printerName": printer_name,
        "queueStats": queue_stats,
    })))
}
