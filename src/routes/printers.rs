use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::auth::api_key::ApiKey;
use crate::state::SharedState;

pub async fn list(_: ApiKey, State(state): State<SharedState>) -> Json<serde_json::Value> {
    let printers = state.deliverer.driver().list_devices().await;
    let default = state.deliverer.resolve_device(None).await;

    Json(json!({
        "count": printers.len(),
        "printers": printers,
        "default": default,
    }))
}
