pub mod print;
pub mod printers;
pub mod queue;
pub mod status;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/print", post(print::print))
        .route("/status", get(status::status))
        .route("/printers", get(printers::list))
        // Queue
        .route("/queue", get(queue::list))
        .route("/queue/process", post(queue::process))
        .route("/queue/{id}", get(queue::get))
}
