//! Shared setup for engine integration tests.

#![allow(dead_code)]

use showtime_core::payment::PaymentCapability;
use showtime_core::ScreeningKey;
use showtime_engine::{
    EngineConfig, EngineEnvironment, ReservationRequest, SeatSelection, ShowtimeEngine,
    SimulatedPaymentGateway,
};
use showtime_testing::Cinema;
use std::sync::Arc;
use std::time::Duration;

/// Engine over the cinema's in-memory stores and clock
pub fn engine_over(cinema: &Cinema, gateway: &SimulatedPaymentGateway) -> ShowtimeEngine {
    engine_with(cinema, gateway, EngineConfig::default())
}

/// Same as [`engine_over`] with a custom configuration
pub fn engine_with(
    cinema: &Cinema,
    gateway: &SimulatedPaymentGateway,
    config: EngineConfig,
) -> ShowtimeEngine {
    engine_paying_through(cinema, gateway.clone().shared(), config)
}

/// Engine over the cinema with an arbitrary payment capability
pub fn engine_paying_through(
    cinema: &Cinema,
    payments: Arc<dyn PaymentCapability>,
    config: EngineConfig,
) -> ShowtimeEngine {
    let env = EngineEnvironment::new(
        Arc::new(cinema.clock.clone()),
        Arc::new(cinema.bookings.clone()),
        Arc::new(cinema.screenings.clone()),
        Arc::new(cinema.catalog.clone()),
        payments,
    );
    ShowtimeEngine::new(env, config)
}

/// Configuration with a short critical-section wait
pub fn impatient_config() -> EngineConfig {
    EngineConfig {
        lock_wait: Duration::from_millis(50),
        ..EngineConfig::default()
    }
}

/// Reservation for `seats` given as `(row, col)`, no quoted prices
pub fn request(key: &ScreeningKey, seats: &[(u32, u32)]) -> ReservationRequest {
    ReservationRequest {
        screening: key.clone(),
        seats: seats
            .iter()
            .map(|&(row, col)| SeatSelection::at(row, col))
            .collect(),
        payer: None,
        quoted_total: None,
    }
}
