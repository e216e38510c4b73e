#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use labelq::config::{Config, LabelConfig, PrinterConfig, QueueConfig};
use labelq::db;
use labelq::printer::{PrinterDriver, PrinterError};
use labelq::state::SharedState;

pub const PRINTER: &str = "zebra";

/// Scriptable stand-in for a label printer.
///
/// Each `send` pops the next scripted outcome; once the script runs out every
/// send returns `default_outcome`.
pub struct FakePrinter {
    devices: Vec<String>,
    available: AtomicBool,
    default_outcome: AtomicBool,
    script: Mutex<VecDeque<bool>>,
    sent: Mutex<Vec<(String, String)>>,
    send_delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Counts a send as in flight until dropped, including when the send is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakePrinter {
    pub fn new() -> Self {
        Self::with_devices(&[PRINTER])
    }

    pub fn with_devices(devices: &[&str]) -> Self {
        Self {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            available: AtomicBool::new(true),
            default_outcome: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            send_delay_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_default_outcome(&self, ok: bool) {
        self.default_outcome.store(ok, Ordering::SeqCst);
    }

    pub fn script(&self, outcomes: &[bool]) {
        self.script.lock().unwrap().extend(outcomes.iter().copied());
    }

    /// `(device, markup)` for every send attempt, successful or not.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Make every send take this long.
    pub fn set_send_delay(&self, delay: Duration) {
        self.send_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Highest number of sends that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrinterDriver for FakePrinter {
    async fn list_devices(&self) -> Vec<String> {
        self.devices.clone()
    }

    async fn default_device(&self) -> Option<String> {
        self.devices.first().cloned()
    }

    async fn is_available(&self, device: &str) -> bool {
        self.available.load(Ordering::SeqCst) && self.devices.iter().any(|d| d == device)
    }

    async fn send(&self, markup: &str, device: &str) -> Result<bool, PrinterError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        // yield so concurrent passes interleave around the send
        match self.send_delay_ms.load(Ordering::SeqCst) {
            0 => tokio::task::yield_now().await,
            ms => tokio::time::sleep(Duration::from_millis(ms)).await,
        }

        self.sent
            .lock()
            .unwrap()
            .push((device.to_string(), markup.to_string()));

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.load(Ordering::SeqCst));
        Ok(outcome)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        api_key: None,
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
        printer: PrinterConfig {
            devices: vec![],
            default_printer: None,
            timeout: Duration::from_secs(2),
        },
        label: LabelConfig::default(),
        queue: QueueConfig {
            check_interval: Duration::from_millis(50),
            ..QueueConfig::default()
        },
        shutdown_timeout: Duration::from_secs(2),
    }
}

pub async fn test_pool() -> SqlitePool {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool)
        .await
        .expect("Failed to run migrations on test database");
    pool
}

/// Application state over a fresh database, without the HTTP server.
pub async fn test_state(config: Config, printer: Arc<FakePrinter>) -> SharedState {
    let pool = test_pool().await;
    labelq::build_state(pool, config, printer)
}

pub fn label_body() -> Value {
    json!({
        "labelType": "product",
        "data": {
            "code": "7891234567895",
            "description": "HEX BOLT M8",
            "lot": "L042"
        }
    })
}

/// A running test server backed by an in-memory queue and a fake printer.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: SqlitePool,
    pub client: Client,
    pub printer: Arc<FakePrinter>,
    pub state: SharedState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn print(&self, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/print"))
            .json(body)
            .send()
            .await
            .expect("print request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// Spawn a test app with the given config. The background dispatcher is not
/// started; tests drive the queue through `POST /queue/process`.
pub async fn spawn_app_with(config: Config) -> TestApp {
    let printer = Arc::new(FakePrinter::new());
    let state = test_state(config, printer.clone()).await;
    let app = labelq::build_app(state.clone());

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        pool: state.pool.clone(),
        client: Client::new(),
        printer,
        state,
    }
}
