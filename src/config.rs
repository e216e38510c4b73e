use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub api_key: Option<String>,
    pub max_body_size: usize,
    pub log_level: String,
    pub printer: PrinterConfig,
    pub label: LabelConfig,
    pub queue: QueueConfig,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub devices: Vec<PrinterDevice>,
    pub default_printer: Option<String>,
    pub timeout: Duration,
}

/// A named network printer reachable at `host[:port]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterDevice {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct LabelConfig {
    pub dpi: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub margin_left_mm: u32,
    pub margin_top_mm: u32,
    pub column_gap_mm: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            width_mm: 50,
            height_mm: 25,
            margin_left_mm: 3,
            margin_top_mm: 0,
            column_gap_mm: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub check_interval: Duration,
    pub max_retries: u32,
    pub batch_limit: i64,
    pub manual_batch_limit: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            max_retries: 3,
            batch_limit: 10,
            manual_batch_limit: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_or("DATABASE_URL", "sqlite://data/print_queue.db");

        let host: IpAddr = env_or("LABELQ_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid LABELQ_HOST: {e}"))?;

        let port: u16 = env_or("LABELQ_PORT", "8000")
            .parse()
            .map_err(|e| format!("Invalid LABELQ_PORT: {e}"))?;

        let api_key = std::env::var("LABELQ_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let max_body_size: usize = env_or("LABELQ_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid LABELQ_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("LABELQ_LOG_LEVEL", "info");

        let devices = parse_printers(&env_or("LABELQ_PRINTERS", ""))?;

        let default_printer = std::env::var("LABELQ_DEFAULT_PRINTER")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let printer_timeout: u64 = env_or("LABELQ_PRINTER_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid LABELQ_PRINTER_TIMEOUT_SECS: {e}"))?;

        let label = LabelConfig {
            dpi: parse_env("LABELQ_LABEL_DPI", "300")?,
            width_mm: parse_env("LABELQ_LABEL_WIDTH_MM", "50")?,
            height_mm: parse_env("LABELQ_LABEL_HEIGHT_MM", "25")?,
            margin_left_mm: parse_env("LABELQ_LABEL_MARGIN_LEFT_MM", "3")?,
            margin_top_mm: parse_env("LABELQ_LABEL_MARGIN_TOP_MM", "0")?,
            column_gap_mm: parse_env("LABELQ_COLUMN_GAP_MM", "0")?,
        };

        let check_interval: u64 = parse_env("LABELQ_QUEUE_CHECK_INTERVAL_SECS", "5")?;
        let max_retries: u32 = parse_env("LABELQ_QUEUE_MAX_RETRIES", "3")?;
        if max_retries == 0 {
            return Err("Invalid LABELQ_QUEUE_MAX_RETRIES: must be at least 1".to_string());
        }

        let queue = QueueConfig {
            check_interval: Duration::from_secs(check_interval),
            max_retries,
            batch_limit: at_least_one(
                "LABELQ_QUEUE_BATCH_LIMIT",
                parse_env("LABELQ_QUEUE_BATCH_LIMIT", "10")?,
            )?,
            manual_batch_limit: at_least_one(
                "LABELQ_QUEUE_MANUAL_BATCH_LIMIT",
                parse_env("LABELQ_QUEUE_MANUAL_BATCH_LIMIT", "50")?,
            )?,
        };

        let shutdown_timeout = shutdown_wait(
            std::env::var("LABELQ_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .map_err(|e| format!("Invalid LABELQ_SHUTDOWN_TIMEOUT_SECS: {e}"))
                })
                .transpose()?,
            Duration::from_secs(printer_timeout),
        );

        Ok(Config {
            database_url,
            host,
            port,
            api_key,
            max_body_size,
            log_level,
            printer: PrinterConfig {
                devices,
                default_printer,
                timeout: Duration::from_secs(printer_timeout),
            },
            label,
            queue,
            shutdown_timeout,
        })
    }
}

/// Parse `name=host[:port]` pairs separated by commas.
pub fn parse_printers(raw: &str) -> Result<Vec<PrinterDevice>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|entry| {
            let (name, address) = entry
                .split_once('=')
                .ok_or_else(|| format!("Invalid LABELQ_PRINTERS entry '{entry}': expected name=host[:port]"))?;
            let (name, address) = (name.trim(), address.trim());
            if name.is_empty() || address.is_empty() {
                return Err(format!("Invalid LABELQ_PRINTERS entry '{entry}': empty name or address"));
            }
            Ok(PrinterDevice {
                name: name.to_string(),
                address: address.to_string(),
            })
        })
        .collect()
}

fn at_least_one(key: &str, value: i64) -> Result<i64, String> {
    if value < 1 {
        return Err(format!("Invalid {key}: must be at least 1"));
    }
    Ok(value)
}

/// How long shutdown waits for the dispatcher. Never shorter than one printer
/// send, so a job is not cut off mid-write.
pub fn shutdown_wait(configured_secs: Option<u64>, printer_timeout: Duration) -> Duration {
    let floor = printer_timeout + Duration::from_secs(5);
    match configured_secs {
        Some(secs) => Duration::from_secs(secs).max(floor),
        None => floor,
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
