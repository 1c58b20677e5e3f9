//! Engine metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `showtime_reservations_total{outcome}` - Reservation attempts by outcome
//! - `showtime_finalizations_total{outcome}` - Finalize calls by outcome
//! - `showtime_bookings_expired_total` - Pending bookings cancelled by the sweeper
//! - `showtime_schedule_conflicts_total` - Rejected schedule writes
//! - `showtime_seats_sold_total` - Seats moved to paid
//!
//! ## Histograms
//! - `showtime_lock_wait_seconds` - Time spent waiting for a critical section

use metrics::{describe_counter, describe_histogram};
use showtime_core::{Booking, EngineError, Result};

/// Register metric descriptions. Call once at startup, before anything is recorded.
pub fn register_engine_metrics() {
    describe_counter!(
        "showtime_reservations_total",
        "Reservation attempts by outcome (confirmed, seat_conflict, invalid, not_found, busy, error)"
    );
    describe_counter!(
        "showtime_finalizations_total",
        "Payment finalizations by outcome (paid, replayed, not_completed, unknown_reference, error)"
    );
    describe_counter!(
        "showtime_bookings_expired_total",
        "Pending bookings cancelled after the abandonment window"
    );
    describe_counter!(
        "showtime_schedule_conflicts_total",
        "Screening writes rejected for overlapping show times"
    );
    describe_counter!("showtime_seats_sold_total", "Seats on paid bookings");
    describe_histogram!(
        "showtime_lock_wait_seconds",
        "Time spent waiting to enter a critical section"
    );

    tracing::info!("Engine metrics registered");
}

const fn outcome_label(error: &EngineError) -> &'static str {
    match error {
        EngineError::Validation(_) => "invalid",
        EngineError::SeatConflict { .. } => "seat_conflict",
        EngineError::NotFound { .. } => "not_found",
        EngineError::Busy { .. } => "busy",
        EngineError::PaymentNotCompleted { .. } => "not_completed",
        EngineError::PaymentReferenceNotFound(_) => "unknown_reference",
        _ => "error",
    }
}

/// Record the outcome of a reservation attempt.
pub fn record_reservation(outcome: &Result<Booking>) {
    let label = match outcome {
        Ok(_) => "confirmed",
        Err(error) => outcome_label(error),
    };
    metrics::counter!("showtime_reservations_total", "outcome" => label).increment(1);
}

/// Record the outcome of a finalize call; `replayed` marks an idempotent repeat.
pub fn record_finalization(outcome: &Result<Booking>, replayed: bool) {
    let label = match outcome {
        Ok(_) if replayed => "replayed",
        Ok(booking) => {
            metrics::counter!("showtime_seats_sold_total").increment(booking.seats.len() as u64);
            "paid"
        }
        Err(error) => outcome_label(error),
    };
    metrics::counter!("showtime_finalizations_total", "outcome" => label).increment(1);
}

/// Record bookings cancelled by one sweep.
pub fn record_expired(count: usize) {
    metrics::counter!("showtime_bookings_expired_total").increment(count as u64);
    tracing::debug!(count, "Recorded bookings_expired metric");
}
