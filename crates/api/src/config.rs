//! Application configuration loaded from environment variables.

use std::time::Duration;

use workflows::{ActivityOptions, HttpFraudCheck, Services};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` Postgres connection string; unset keeps events in memory
/// - `FRAUD_CHECK_URL` fraud check service; unset approves every charge
/// - `SHIPMENT_ACTIVITY_TIMEOUT_SECS` courier call timeout (default: `5`)
/// - `BILLING_ACTIVITY_TIMEOUT_SECS` pricing and charging timeout (default: `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub fraud_check_url: Option<String>,
    pub shipment_activity_timeout: Duration,
    pub billing_activity_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing, empty or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            value(key)
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let defaults = Self::default();

        Self {
            host: value("HOST").unwrap_or(defaults.host),
            port: value("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: value("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: value("DATABASE_URL"),
            fraud_check_url: value("FRAUD_CHECK_URL"),
            shipment_activity_timeout: secs(
                "SHIPMENT_ACTIVITY_TIMEOUT_SECS",
                defaults.shipment_activity_timeout,
            ),
            billing_activity_timeout: secs(
                "BILLING_ACTIVITY_TIMEOUT_SECS",
                defaults.billing_activity_timeout,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the collaborators processes run against.
    pub fn services(&self) -> Services {
        let services = Services::in_memory()
            .with_shipment_activity(ActivityOptions::new(self.shipment_activity_timeout))
            .with_billing_activity(ActivityOptions::new(self.billing_activity_timeout));

        match &self.fraud_check_url {
            Some(url) => services.with_fraud_check(HttpFraudCheck::new(url.as_str())),
            None => services,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            fraud_check_url: None,
            shipment_activity_timeout: ActivityOptions::shipment().start_to_close_timeout,
            billing_activity_timeout: ActivityOptions::billing().start_to_close_timeout,
        }
    }
}
