use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::api_key::ApiKey;
use crate::error::AppError;
use crate::intake::{parser, pipeline, Submitted};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<Uuid>,
    pub message: String,
}

pub async fn print(
    _: ApiKey,
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<PrintResponse>, AppError> {
    let job = parser::parse_print_request(&body).map_err(AppError::BadRequest)?;

    let response = match pipeline::submit(&state.pool, &state.deliverer, &job).await? {
        Submitted::Printed { device } => PrintResponse {
            success: true,
            queue_id: None,
            message: format!("Label printed on {device}"),
        },
        Submitted::Queued { id, reason } => PrintResponse {
            success: true,
            queue_id: Some(id),
            message: format!("Request queued for processing ({reason})"),
        },
    };

    Ok(Json(response))
}
