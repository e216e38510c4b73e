//! Network label printers spoken to over raw TCP (JetDirect, port 9100).
//!
//! Zebra printers accept ZPL on the raw port with no framing: connect, write
//! the format, close. There is no acknowledgement, so a completed write is
//! the strongest success signal available.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::{PrinterDriver, PrinterError};
use crate::config::PrinterDevice;

pub const RAW_PORT: u16 = 9100;

pub struct NetworkPrinterDriver {
    devices: Vec<PrinterDevice>,
    timeout: Duration,
}

impl NetworkPrinterDriver {
    pub fn new(devices: Vec<PrinterDevice>, timeout: Duration) -> Self {
        Self { devices, timeout }
    }

    fn address(&self, device: &str) -> Option<String> {
        self.devices
            .iter()
            .find(|d| d.name == device)
            .map(|d| with_default_port(&d.address))
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, PrinterError> {
        tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                PrinterError::from(format!(
                    "Connection to {addr} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| PrinterError::from(format!("Connection to {addr} failed: {e}")))
    }
}

#[async_trait]
impl PrinterDriver for NetworkPrinterDriver {
    async fn list_devices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.iter().map(|d| d.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    async fn default_device(&self) -> Option<String> {
        self.devices.first().map(|d| d.name.clone())
    }

    async fn is_available(&self, device: &str) -> bool {
        let Some(addr) = self.address(device) else {
            return false;
        };

        match self.connect(&addr).await {
            Ok(mut stream) => {
                let _ = stream.shutdown().await;
                true
            }
            Err(e) => {
                tracing::debug!("Printer '{device}' unavailable: {e}");
                false
            }
        }
    }

    async fn send(&self, markup: &str, device: &str) -> Result<bool, PrinterError> {
        let addr = self
            .address(device)
            .ok_or_else(|| PrinterError::from(format!("Unknown printer '{device}'")))?;

        let mut stream = self.connect(&addr).await?;

        let write = async {
            stream.write_all(markup.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        };

        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| PrinterError::from(format!("Write to {addr} timed out")))?
            .map_err(|e| PrinterError::from(format!("Write to {addr} failed: {e}")))?;

        tracing::info!(device, bytes = markup.len(), "Label sent to {addr}");
        Ok(true)
    }
}

fn with_default_port(address: &str) -> String {
    let has_port = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.ends_with(':') && port.parse::<u16>().is_ok());
    if has_port {
        address.to_string()
    } else {
        format!("{address}:{RAW_PORT}")
    }
}
