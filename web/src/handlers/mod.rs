//! HTTP request handlers, organized by domain.

pub mod bookings;
pub mod health;
pub mod payments;
pub mod screenings;

pub use health::{health_check, readiness_check};
