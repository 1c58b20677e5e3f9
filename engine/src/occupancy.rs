//! Seat occupancy, derived on demand from bookings.

use showtime_core::store::BookingStore;
use showtime_core::{MovieId, Result, ScreeningKey, SeatCoord, ShowTime};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read-only view of which seats are held.
///
/// Pending and paid bookings both hold their seats; cancelled ones do not.
#[derive(Clone)]
pub struct OccupancyIndex {
    bookings: Arc<dyn BookingStore>,
}

impl OccupancyIndex {
    /// Creates an index over `bookings`
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    /// Seats held for a movie at a date and time, across every screen.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    #[tracing::instrument(skip(self, show_time), fields(show_time = %show_time))]
    pub async fn occupied_seats(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
        show_time: &ShowTime,
    ) -> Result<BTreeSet<SeatCoord>> {
        let bookings = self
            .bookings
            .for_showing(movie_id, show_date, show_time)
            .await?;

        let occupied: BTreeSet<SeatCoord> = bookings
            .iter()
            .filter(|booking| booking.holds_seats())
            .flat_map(|booking| booking.seat_coords())
            .collect();

        tracing::debug!(occupied = occupied.len(), "Occupied seats loaded");
        Ok(occupied)
    }

    /// Seats held for one screening.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn occupied_for(&self, key: &ScreeningKey) -> Result<BTreeSet<SeatCoord>> {
        let bookings = self
            .bookings
            .for_showing(key.movie_id, key.show_date, &key.show_time)
            .await?;

        Ok(bookings
            .iter()
            .filter(|booking| booking.screening.screen_id == key.screen_id)
            .filter(|booking| booking.holds_seats())
            .flat_map(|booking| booking.seat_coords())
            .collect())
    }
}
