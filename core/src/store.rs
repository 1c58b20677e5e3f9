//! Storage abstractions.
//!
//! The booking store is the only shared mutable resource the engine touches.
//! Catalog records are read-only inputs.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` / `PostgresScreeningStore` / `PostgresCatalog`
//!   (in `showtime-postgres`): production storage with unique-index guards
//! - `InMemoryBookingStore` / `InMemoryScreeningStore` / `InMemoryCatalog`
//!   (in `showtime-testing`): fast, deterministic tests

use crate::error::StoreError;
use crate::types::{
    Booking, BookingId, Movie, MovieId, PaymentStatus, Screen, ScreenId, Screening, ScreeningId,
    ShowTime, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Persistence for bookings.
///
/// Implementations must make [`BookingStore::insert`] a conditional write: it
/// refuses a booking whose seats overlap a seat-holding booking of the same
/// screening, so the disjointness invariant holds even across processes.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SeatsTaken`] if any seat is already held for the screening
    /// - [`StoreError::DuplicatePaymentReference`] if the reference is already recorded
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Load a booking by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Load the booking carrying a payment reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError>;

    /// All bookings (any status) for a movie at a date and time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn for_showing(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
        show_time: &ShowTime,
    ) -> Result<Vec<Booking>, StoreError>;

    /// All bookings owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError>;

    /// Every booking in any status, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn list(&self) -> Result<Vec<Booking>, StoreError>;

    /// Record the payment reference of a pending booking (once).
    ///
    /// # Errors
    ///
    /// - [`StoreError::BookingNotFound`]
    /// - [`StoreError::StatusConflict`] if the booking is no longer pending
    /// - [`StoreError::DuplicatePaymentReference`] if a different reference is already set
    async fn attach_payment_reference(
        &self,
        id: BookingId,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError>;

    /// Compare-and-set the payment status. Moving to `Cancelled` also cancels
    /// the booking and releases its seats.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BookingNotFound`]
    /// - [`StoreError::StatusConflict`] if the stored status is not `expected`
    async fn transition(
        &self,
        id: BookingId,
        expected: PaymentStatus,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError>;

    /// Pending bookings created strictly before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;
}

/// Persistence for screenings (the scheduling side).
#[async_trait]
pub trait ScreeningStore: Send + Sync {
    /// Load a screening by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn get(&self, id: ScreeningId) -> Result<Option<Screening>, StoreError>;

    /// Screenings assigned to a screen on a calendar day.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn on_screen(
        &self,
        screen_id: ScreenId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError>;

    /// Screenings of a movie on a calendar day.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn for_movie(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError>;

    /// All screenings, optionally restricted to one day.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn list(&self, show_date: Option<NaiveDate>) -> Result<Vec<Screening>, StoreError>;

    /// Insert or replace a screening.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn save(&self, screening: &Screening) -> Result<(), StoreError>;
}

/// Read-only catalog of screens and movies.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a screen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn screen(&self, id: ScreenId) -> Result<Option<Screen>, StoreError>;

    /// Look up a movie.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn movie(&self, id: MovieId) -> Result<Option<Movie>, StoreError>;
}
