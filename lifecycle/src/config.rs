//! Configuration management for the lifecycle engine.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Binaries call `dotenvy::dotenv()` first so a local `.env` file works too.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ticket token settings
    pub tickets: TicketConfig,
    /// Slot reservation retry settings
    pub reservations: ReservationConfig,
    /// Notification dispatch settings
    pub notifications: NotificationConfig,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Ticket token configuration
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct TicketConfig {
    /// Key for the token integrity tag. `None` draws a random per-process key.
    pub signing_secret: Option<String>,
}

impl std::fmt::Debug for TicketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketConfig")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Reservation retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// Transparent retries of a contended reservation (default: 3)
    pub max_retries: usize,
    /// Initial backoff in milliseconds (default: 10)
    pub retry_delay_ms: u64,
}

impl ReservationConfig {
    /// Initial backoff as a `Duration`
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 10,
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Upper bound on one dispatch in seconds (default: 10)
    pub timeout_secs: u64,
}

impl NotificationConfig {
    /// Timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `TICKET_SIGNING_SECRET`: token key (default: random per process)
    /// - `RESERVATION_MAX_RETRIES`: default 3
    /// - `RESERVATION_RETRY_DELAY_MS`: default 10
    /// - `NOTIFICATION_TIMEOUT_SECS`: default 10
    /// - `LOG_LEVEL`: default `info`
    ///
    /// Unparseable numbers fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let reservations = ReservationConfig::default();
        let notifications = NotificationConfig::default();

        Self {
            tickets: TicketConfig {
                signing_secret: env::var("TICKET_SIGNING_SECRET")
                    .ok()
                    .filter(|secret| !secret.is_empty()),
            },
            reservations: ReservationConfig {
                max_retries: env::var("RESERVATION_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(reservations.max_retries),
                retry_delay_ms: env::var("RESERVATION_RETRY_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(reservations.retry_delay_ms),
            },
            notifications: NotificationConfig {
                timeout_secs: env::var("NOTIFICATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(notifications.timeout_secs),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickets: TicketConfig::default(),
            reservations: ReservationConfig::default(),
            notifications: NotificationConfig::default(),
            log_level: "info".to_string(),
        }
    }
}
