//! In-memory storage for fast, deterministic tests.
//!
//! - [`InMemoryBookingStore`]: conditional inserts and compare-and-set transitions
//!   under one lock, mirroring the unique-index guarantees of the Postgres store
//! - [`InMemoryScreeningStore`]: HashMap-backed screenings
//! - [`InMemoryCatalog`]: screens and movies

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use showtime_core::store::{BookingStore, CatalogStore, ScreeningStore};
use showtime_core::{
    Booking, BookingId, BookingStatus, Movie, MovieId, PaymentStatus, Screen, ScreenId, Screening,
    ScreeningId, SeatCoord, ShowTime, StoreError, UserId,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory booking store.
///
/// # Example
///
/// ```
/// use showtime_testing::InMemoryBookingStore;
///
/// let store = InMemoryBookingStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    fail_next_insert: Arc<AtomicBool>,
}

impl InMemoryBookingStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings, in any status
    #[must_use]
    pub fn len(&self) -> usize {
        self.bookings.read().unwrap().len()
    }

    /// Whether the store holds no bookings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookings.read().unwrap().is_empty()
    }

    /// Snapshot of every stored booking
    #[must_use]
    pub fn all(&self) -> Vec<Booking> {
        self.bookings.read().unwrap().values().cloned().collect()
    }

    /// Store a booking as-is, bypassing the seat checks (for seeding odd states)
    pub fn put(&self, booking: Booking) {
        self.bookings.write().unwrap().insert(booking.id, booking);
    }

    /// Make the next [`BookingStore::insert`] fail with a database error
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("connection reset".to_string()));
        }

        let mut bookings = self.bookings.write().unwrap();

        if let Some(reference) = &booking.payment_reference {
            if bookings
                .values()
                .any(|b| b.payment_reference.as_ref() == Some(reference))
            {
                return Err(StoreError::DuplicatePaymentReference(reference.clone()));
            }
        }

        if booking.holds_seats() {
            let wanted: BTreeSet<SeatCoord> = booking.seat_coords().collect();
            let taken: BTreeSet<SeatCoord> = bookings
                .values()
                .filter(|b| b.holds_seats() && b.screening == booking.screening)
                .flat_map(Booking::seat_coords)
                .filter(|seat| wanted.contains(seat))
                .collect();
            if !taken.is_empty() {
                return Err(StoreError::SeatsTaken(taken.into_iter().collect()));
            }
        }

        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().unwrap().get(&id).cloned())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .find(|b| b.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn for_showing(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
        show_time: &ShowTime,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| {
                b.screening.movie_id == movie_id
                    && b.screening.show_date == show_date
                    && &b.screening.show_time == show_time
            })
            .cloned()
            .collect())
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError> {
        let mut owned: Vec<Booking> = self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.user_id == Some(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let mut all = self.all();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn attach_payment_reference(
        &self,
        id: BookingId,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().unwrap();

        if bookings
            .values()
            .any(|b| b.id != id && b.payment_reference.as_deref() == Some(reference))
        {
            return Err(StoreError::DuplicatePaymentReference(reference.to_string()));
        }

        let booking = bookings
            .get_mut(&id)
            .ok_or(StoreError::BookingNotFound(id))?;
        if booking.payment_status != PaymentStatus::Pending {
            return Err(StoreError::StatusConflict {
                booking_id: id,
                expected: PaymentStatus::Pending,
                actual: booking.payment_status,
            });
        }
        match &booking.payment_reference {
            Some(existing) if existing != reference => {
                return Err(StoreError::DuplicatePaymentReference(existing.clone()));
            }
            _ => {}
        }

        booking.payment_reference = Some(reference.to_string());
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn transition(
        &self,
        id: BookingId,
        expected: PaymentStatus,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().unwrap();
        let booking = bookings
            .get_mut(&id)
            .ok_or(StoreError::BookingNotFound(id))?;

        if booking.payment_status != expected {
            return Err(StoreError::StatusConflict {
                booking_id: id,
                expected,
                actual: booking.payment_status,
            });
        }

        booking.payment_status = next;
        if next == PaymentStatus::Cancelled {
            booking.booking_status = BookingStatus::Cancelled;
        }
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.payment_status == PaymentStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect())
    }
}

/// In-memory screening store
#[derive(Clone, Debug, Default)]
pub struct InMemoryScreeningStore {
    screenings: Arc<RwLock<HashMap<ScreeningId, Screening>>>,
}

impl InMemoryScreeningStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored screenings
    #[must_use]
    pub fn len(&self) -> usize {
        self.screenings.read().unwrap().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.screenings.read().unwrap().is_empty()
    }
}

#[async_trait]
impl ScreeningStore for InMemoryScreeningStore {
    async fn get(&self, id: ScreeningId) -> Result<Option<Screening>, StoreError> {
        Ok(self.screenings.read().unwrap().get(&id).cloned())
    }

    async fn on_screen(
        &self,
        screen_id: ScreenId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError> {
        Ok(self
            .screenings
            .read()
            .unwrap()
            .values()
            .filter(|s| s.screen_id == Some(screen_id) && s.show_date == show_date)
            .cloned()
            .collect())
    }

    async fn for_movie(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError> {
        Ok(self
            .screenings
            .read()
            .unwrap()
            .values()
            .filter(|s| s.movie_id == movie_id && s.show_date == show_date)
            .cloned()
            .collect())
    }

    async fn list(&self, show_date: Option<NaiveDate>) -> Result<Vec<Screening>, StoreError> {
        let mut screenings: Vec<Screening> = self
            .screenings
            .read()
            .unwrap()
            .values()
            .filter(|s| show_date.is_none_or(|date| s.show_date == date))
            .cloned()
            .collect();
        screenings.sort_by(|a, b| {
            a.show_date
                .cmp(&b.show_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(screenings)
    }

    async fn save(&self, screening: &Screening) -> Result<(), StoreError> {
        self.screenings
            .write()
            .unwrap()
            .insert(screening.id, screening.clone());
        Ok(())
    }
}

/// In-memory catalog of screens and movies
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    screens: Arc<RwLock<HashMap<ScreenId, Screen>>>,
    movies: Arc<RwLock<HashMap<MovieId, Movie>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a screen
    pub fn add_screen(&self, screen: Screen) {
        self.screens.write().unwrap().insert(screen.id, screen);
    }

    /// Add or replace a movie
    pub fn add_movie(&self, movie: Movie) {
        self.movies.write().unwrap().insert(movie.id, movie);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn screen(&self, id: ScreenId) -> Result<Option<Screen>, StoreError> {
        Ok(self.screens.read().unwrap().get(&id).cloned())
    }

    async fn movie(&self, id: MovieId) -> Result<Option<Movie>, StoreError> {
        Ok(self.movies.read().unwrap().get(&id).cloned())
    }
}
