pub mod config;
pub mod error;
pub mod state;
pub mod auth;
pub mod db;
pub mod models;
pub mod routes;
pub mod label;
pub mod printer;
pub mod delivery;
pub mod dispatcher;
pub mod intake;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::delivery::Deliverer;
use crate::dispatcher::Dispatcher;
use crate::printer::PrinterDriver;
use crate::state::{AppState, SharedState};

/// Wire the printer driver, deliverer and dispatcher around one pool.
pub fn build_state(pool: SqlitePool, config: Config, driver: Arc<dyn PrinterDriver>) -> SharedState {
    let deliverer = Arc::new(Deliverer::new(driver, &config.printer, config.label.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        pool.clone(),
        deliverer.clone(),
        config.queue.clone(),
    ));

    Arc::new(AppState {
        pool,
        config,
        deliverer,
        dispatcher,
    })
}

pub fn build_app(state: SharedState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .merge(routes::api_routes())
        .route("/", get(index))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                )),
        )
        .with_state(state)
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
        "endpoints": [
            "POST /print",
            "GET /status",
            "GET /queue",
            "GET /queue/{id}",
            "POST /queue/process",
            "GET /printers",
            "GET /health",
        ],
    }))
}

async fn health() -> &'static str {
    "ok"
}
