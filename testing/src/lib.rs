//! # Showtime Testing
//!
//! Testing utilities for the Showtime booking engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - In-memory implementations of the storage traits
//! - Fixtures for the house screens and a ready-made [`Cinema`]
//!
//! ## Example
//!
//! ```ignore
//! use showtime_testing::{Cinema, show_date};
//!
//! #[tokio::test]
//! async fn books_a_seat() {
//!     let cinema = Cinema::new();
//!     cinema.schedule(&cinema.silver, show_date(), &["7:00 PM"]).await;
//!     let engine = engine_over(&cinema);
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use showtime_core::environment::Clock;

pub mod fixtures;
pub mod stores;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use showtime_testing::mocks::FixedClock;
    /// use showtime_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock tests can move forward, for the abandonment window.
    ///
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move time forward by `by`
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test-friendly tracing subscriber once; `RUST_LOG` controls verbosity.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::{
    booking_at, platinum_screen, screening_key, show_date, silver_screen, Cinema, FLAT_RATE,
};
pub use mocks::{test_clock, FixedClock, ManualClock};
pub use stores::{InMemoryBookingStore, InMemoryCatalog, InMemoryScreeningStore};
