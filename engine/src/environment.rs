//! Injected dependencies shared by all engine components.

use showtime_core::environment::Clock;
use showtime_core::payment::PaymentCapability;
use showtime_core::store::{BookingStore, CatalogStore, ScreeningStore};
use std::sync::Arc;

/// Environment dependencies for the engine
#[derive(Clone)]
pub struct EngineEnvironment {
    /// Clock for timestamps and the abandonment window
    pub clock: Arc<dyn Clock>,
    /// Booking persistence (the shared mutable resource)
    pub bookings: Arc<dyn BookingStore>,
    /// Screening persistence
    pub screenings: Arc<dyn ScreeningStore>,
    /// Read-only screens and movies
    pub catalog: Arc<dyn CatalogStore>,
    /// External payment provider
    pub payments: Arc<dyn PaymentCapability>,
}

impl EngineEnvironment {
    /// Creates a new `EngineEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        bookings: Arc<dyn BookingStore>,
        screenings: Arc<dyn ScreeningStore>,
        catalog: Arc<dyn CatalogStore>,
        payments: Arc<dyn PaymentCapability>,
    ) -> Self {
        Self {
            clock,
            bookings,
            screenings,
            catalog,
            payments,
        }
    }
}
