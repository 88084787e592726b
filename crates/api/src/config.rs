//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RATE_LIMIT` — purchase requests per identity per window (default: `10`)
/// - `RATE_WINDOW_SECS` — rate limit window (default: `60`)
/// - `WORKERS` — fulfillment worker count (default: `4`)
/// - `FULFILLMENT_MILLIS` — simulated fulfillment duration (default: `2000`)
/// - `CANCEL_WINDOW_SECS` — cancellation window (default: `300`)
/// - `WORK_LEASE_SECS` — work queue delivery lease (default: `30`)
/// - `MAX_DELIVERIES` — deliveries before an item is poison (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub workers: usize,
    pub fulfillment_delay: Duration,
    pub cancel_window: Duration,
    pub work_lease: Duration,
    pub max_deliveries: u32,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 3000),
            rate_limit: env_parsed("RATE_LIMIT", 10),
            rate_window: Duration::from_secs(env_parsed("RATE_WINDOW_SECS", 60)),
            workers: env_parsed("WORKERS", 4),
            fulfillment_delay: Duration::from_millis(env_parsed("FULFILLMENT_MILLIS", 2000)),
            cancel_window: Duration::from_secs(env_parsed("CANCEL_WINDOW_SECS", 300)),
            work_lease: Duration::from_secs(env_parsed("WORK_LEASE_SECS", 30)),
            max_deliveries: env_parsed("MAX_DELIVERIES", 3),
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
            port: 3000,
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            workers: 4,
            fulfillment_delay: Duration::from_millis(2000),
            cancel_window: Duration::from_secs(300),
            work_lease: Duration::from_secs(30),
            max_deliveries: 3,
        }
    }
}
