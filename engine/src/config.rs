//! Engine configuration.
//!
//! Plain data with defaults so tests can build it directly; [`EngineConfig::from_env`]
//! overlays environment variables the same way the server configuration does.

use serde::{Deserialize, Serialize};
use showtime_core::Money;
use std::env;
use std::time::Duration;

/// Tunables for reservation, finalization and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Longest a request waits for a screening / screen-day / payment critical section
    pub lock_wait: Duration,
    /// Pending bookings older than this are cancelled by the sweeper
    pub abandonment_window: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
    /// Price for seats not covered by a seat-type zone
    pub flat_seat_price: Money,
    /// Currency handed to the payment capability
    pub currency: String,
    /// Upper bound on seats in one booking
    pub max_seats_per_booking: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(2),
            abandonment_window: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
            flat_seat_price: Money::from_cents(130_000),
            currency: "lkr".to_string(),
            max_seats_per_booking: 10,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lock_wait: env_parse("RESERVATION_LOCK_WAIT_MS")
                .map_or(defaults.lock_wait, Duration::from_millis),
            abandonment_window: env_parse("RESERVATION_ABANDON_AFTER_SECS")
                .map_or(defaults.abandonment_window, Duration::from_secs),
            sweep_interval: env_parse("EXPIRY_SWEEP_INTERVAL_SECS")
                .map_or(defaults.sweep_interval, Duration::from_secs),
            flat_seat_price: env_parse("FLAT_SEAT_PRICE_CENTS")
                .map_or(defaults.flat_seat_price, Money::from_cents),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            max_seats_per_booking: env_parse("MAX_SEATS_PER_BOOKING")
                .unwrap_or(defaults.max_seats_per_booking),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}
