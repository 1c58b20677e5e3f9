//! # Showtime Core
//!
//! Domain model and seams for the show scheduling and seat reservation engine.
//!
//! - [`types`]: identifiers, money, seats, screens, screenings, bookings
//! - [`error`]: the error taxonomy (validation, conflicts, payment, storage)
//! - [`environment`]: injected dependencies such as [`environment::Clock`]
//! - [`store`]: booking, screening and catalog storage traits
//! - [`payment`]: the external payment capability
//!
//! The engine itself lives in `showtime-engine`; storage backends in
//! `showtime-postgres` and `showtime-testing`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod error;
pub mod payment;
pub mod store;
pub mod types;

pub use error::{EngineError, PaymentError, StoreError, ValidationError};
pub use types::*;

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
