pub mod network;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct PrinterError {
    pub message: String,
}

impl std::fmt::Display for PrinterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for PrinterError {
    fn from(s: String) -> Self {
        PrinterError { message: s }
    }
}

impl From<&str> for PrinterError {
    fn from(s: &str) -> Self {
        PrinterError {
            message: s.to_string(),
        }
    }
}

/// Access to physical label printers.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Names of every device this driver can address.
    async fn list_devices(&self) -> Vec<String>;

    /// Device used when a request names none (or an unknown one).
    async fn default_device(&self) -> Option<String>;

    async fn is_available(&self, device: &str) -> bool;

    /// Returns `Ok(false)` when the device refused the job.
    async fn send(&self, markup: &str, device: &str) -> Result<bool, PrinterError>;
}

/// Pick the device for a request: the requested one if it exists, then the
/// configured default, then whatever the driver considers its default.
pub async fn resolve_device(
    driver: &dyn PrinterDriver,
    requested: Option<&str>,
    configured_default: Option<&str>,
) -> Option<String> {
    let devices = driver.list_devices().await;

    if let Some(name) = requested {
        if devices.iter().any(|d| d == name) {
            return Some(name.to_string());
        }
        tracing::warn!("Printer '{name}' not found, falling back to default");
    }

    if let Some(name) = configured_default {
        if devices.iter().any(|d| d == name) {
            return Some(name.to_string());
        }
    }

    driver.default_device().await
}

/// One async mutex per device name so only one job streams to a printer at a time.
#[derive(Default)]
pub struct DeviceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, device: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(device.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
