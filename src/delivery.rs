use std::sync::Arc;
use std::time::Duration;

use crate::config::{LabelConfig, PrinterConfig};
use crate::label::{self, LabelRequest};
use crate::printer::{self, DeviceLocks, PrinterDriver};

/// Why a label did not reach the printer. Every variant is retryable.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    DeviceUnavailable(Option<String>),
    InvalidPayload(String),
    InvalidMarkup(String),
    DeliveryFailure(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::DeviceUnavailable(Some(device)) => {
                write!(f, "Printer '{device}' is not available")
            }
            DeliveryError::DeviceUnavailable(None) => write!(f, "No printer available"),
            DeliveryError::InvalidPayload(msg) => write!(f, "Invalid label payload: {msg}"),
            DeliveryError::InvalidMarkup(msg) => write!(f, "Invalid label markup: {msg}"),
            DeliveryError::DeliveryFailure(msg) => write!(f, "Print failed: {msg}"),
        }
    }
}

/// Renders labels and pushes them to printers. Shared by the request fast
/// path and the dispatcher so both go through the same per-device lock.
pub struct Deliverer {
    driver: Arc<dyn PrinterDriver>,
    locks: DeviceLocks,
    label: LabelConfig,
    default_printer: Option<String>,
    send_timeout: Duration,
}

impl Deliverer {
    pub fn new(driver: Arc<dyn PrinterDriver>, printer: &PrinterConfig, label: LabelConfig) -> Self {
        Self {
            driver,
            locks: DeviceLocks::new(),
            label,
            default_printer: printer.default_printer.clone(),
            send_timeout: printer.timeout,
        }
    }

    pub fn driver(&self) -> &dyn PrinterDriver {
        self.driver.as_ref()
    }

    pub async fn resolve_device(&self, requested: Option<&str>) -> Option<String> {
        printer::resolve_device(self.driver.as_ref(), requested, self.default_printer.as_deref()).await
    }

    /// Deliver a stored payload. Returns the device it was printed on.
    pub async fn deliver_payload(
        &self,
        payload: &serde_json::Value,
        requested: Option<&str>,
    ) -> Result<String, DeliveryError> {
        let request = LabelRequest::deserialize_payload(payload)
            .map_err(|e| DeliveryError::InvalidPayload(e.to_string()))?;
        self.deliver(&request, requested).await
    }

    /// Check availability, render, validate and send one label.
    pub async fn deliver(
        &self,
        request: &LabelRequest,
        requested: Option<&str>,
    ) -> Result<String, DeliveryError> {
        let device = self
            .resolve_device(requested)
            .await
            .ok_or(DeliveryError::DeviceUnavailable(None))?;

        if !self.driver.is_available(&device).await {
            return Err(DeliveryError::DeviceUnavailable(Some(device)));
        }

        let markup = label::render(request, &self.label)
            .map_err(|e| DeliveryError::InvalidMarkup(e.to_string()))?;
        label::validate(&markup).map_err(|e| DeliveryError::InvalidMarkup(e.to_string()))?;

        // Waiting for the device lock counts against the send timeout.
        let send = async {
            let _guard = self.locks.acquire(&device).await;
            self.driver.send(&markup, &device).await
        };

        let outcome = tokio::time::timeout(self.send_timeout, send).await;
        match outcome {
            Ok(Ok(true)) => Ok(device),
            Ok(Ok(false)) => Err(DeliveryError::DeliveryFailure(format!(
                "printer '{device}' rejected the job"
            ))),
            Ok(Err(e)) => Err(DeliveryError::DeliveryFailure(e.message)),
            Err(_) => Err(DeliveryError::DeliveryFailure(format!(
                "send to '{device}' timed out after {}ms",
                self.send_timeout.as_millis()
            ))),
        }
    }
}
