use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::delivery::Deliverer;
use crate::dispatcher::Dispatcher;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub deliverer: Arc<Deliverer>,
    pub dispatcher: Arc<Dispatcher>,
}
