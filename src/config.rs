//! Environment-based configuration.
//!
//! Everything has a sensible default, so a bare `boxoffice` starts a working
//! instance. Invalid values fall back to the default with a warning rather
//! than refusing to start.
//!
//! | Variable                         | Default      | Meaning                       |
//! |----------------------------------|--------------|-------------------------------|
//! | `BOXOFFICE_ADDR`                 | 0.0.0.0:3000 | HTTP listen address           |
//! | `BOXOFFICE_DATA_DIR`             | ./data       | Snapshot, log, proof storage  |
//! | `BOXOFFICE_PAYMENT_TIMEOUT_SECS` | 300          | Reservation payment window    |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::sched::RetryConfig;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen address.
    pub addr: SocketAddr,

    /// Root directory for durable state.
    pub data_dir: PathBuf,

    /// Fixed delay from reservation creation to automatic expiry.
    pub payment_window: Duration,

    /// Expiry job redelivery policy.
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from("./data"),
            payment_window: Duration::from_secs(300),
            retry: RetryConfig::DEFAULT,
        }
    }
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through a lookup function (testable without
    /// touching process environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();

        let addr = match lookup("BOXOFFICE_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "invalid BOXOFFICE_ADDR, using default");
                defaults.addr
            }),
            None => defaults.addr,
        };

        let data_dir = lookup("BOXOFFICE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let payment_window = match lookup("BOXOFFICE_PAYMENT_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "invalid BOXOFFICE_PAYMENT_TIMEOUT_SECS, using default");
                    defaults.payment_window
                }
            },
            None => defaults.payment_window,
        };

        AppConfig {
            addr,
            data_dir,
            payment_window,
            retry: defaults.retry,
        }
    }
}
