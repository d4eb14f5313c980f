//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `7070`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `APP_NAME`: service name attached to logs (default: `"Auth"`)
/// - `STORE_TIMEOUT_MS`: deadline for each event store call (default: `5000`)
/// - `BUS_CAPACITY`: buffered envelopes per bus subscriber (default: `1024`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub app_name: String,
    pub store_timeout: Duration,
    pub bus_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|f| f.parse().ok())
                .unwrap_or(defaults.log_format),
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            store_timeout: lookup("STORE_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            bus_capacity: lookup("BUS_CAPACITY")
                .and_then(|c| c.parse().ok())
                .filter(|c| *c > 0)
                .unwrap_or(defaults.bus_capacity),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7070,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            app_name: "Auth".to_string(),
            store_timeout: Duration::from_millis(5000),
            bus_capacity: 1024,
        }
    }
}
