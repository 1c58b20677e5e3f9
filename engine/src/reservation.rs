//! Reservation transactions.
//!
//! The occupancy read and the booking insert for one screening happen inside that
//! screening's critical section, and the store's insert is itself conditional.
//! Two overlapping requests for the same screening therefore cannot both succeed,
//! while requests for different screenings never wait on each other.

use crate::config::EngineConfig;
use crate::environment::EngineEnvironment;
use crate::locks::{KeyedGuard, KeyedLocks};
use crate::metrics::record_reservation;
use crate::occupancy::OccupancyIndex;
use crate::pricing::{PriceList, SeatSelection};
use serde::{Deserialize, Serialize};
use showtime_core::{
    BookedSeat, Booking, BookingId, EngineError, Money, PaymentStatus, Result, Screen, ScreeningKey,
    SeatCoord, ShowingStatus, StoreError, UserId, ValidationError,
};
use std::sync::Arc;

/// A request to hold seats for one screening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Screening to book
    pub screening: ScreeningKey,
    /// Seats wanted
    pub seats: Vec<SeatSelection>,
    /// Paying user; `None` for guests
    #[serde(default)]
    pub payer: Option<UserId>,
    /// Total the client displayed, checked against the resolved prices
    #[serde(default)]
    pub quoted_total: Option<Money>,
}

/// Runs the atomic check-and-insert for seat reservations.
pub struct ReservationManager {
    env: EngineEnvironment,
    config: EngineConfig,
    occupancy: OccupancyIndex,
    locks: KeyedLocks<ScreeningKey>,
}

impl ReservationManager {
    /// Creates a manager with its own per-screening critical sections
    #[must_use]
    pub fn new(env: EngineEnvironment, config: EngineConfig) -> Self {
        let occupancy = OccupancyIndex::new(Arc::clone(&env.bookings));
        let locks = KeyedLocks::new(config.lock_wait);
        Self {
            env,
            config,
            occupancy,
            locks,
        }
    }

    /// The occupancy index this manager checks against
    #[must_use]
    pub const fn occupancy(&self) -> &OccupancyIndex {
        &self.occupancy
    }

    /// Hold seats as a new pending booking.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for bad seats, prices or an unsellable screening
    /// - [`EngineError::NotFound`] for an unknown movie, screen or screening
    /// - [`EngineError::SeatConflict`] if any seat is already held
    /// - [`EngineError::Busy`] if the screening is contended past the wait bound
    #[tracing::instrument(
        skip(self, request),
        fields(screening = %request.screening, seats = request.seats.len())
    )]
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Booking> {
        self.reserve_as(request, PaymentStatus::Pending, None).await
    }

    /// Hold seats with a given initial status and payment reference.
    ///
    /// Used by the finalizer to materialize a paid booking through the same
    /// atomic path as an ordinary reservation.
    ///
    /// # Errors
    ///
    /// Same as [`ReservationManager::reserve`].
    pub async fn reserve_as(
        &self,
        request: ReservationRequest,
        status: PaymentStatus,
        payment_reference: Option<String>,
    ) -> Result<Booking> {
        let outcome = self.try_reserve(request, status, payment_reference).await;
        record_reservation(&outcome);
        outcome
    }

    /// Validate and price a request without holding anything.
    ///
    /// # Errors
    ///
    /// Same validation and lookup errors as [`ReservationManager::reserve`].
    pub async fn quote(&self, request: &ReservationRequest) -> Result<Vec<BookedSeat>> {
        let screen = self.sellable_screen(&request.screening).await?;
        Ok(PriceList::new(&screen, self.config.flat_seat_price).price_selection(
            &request.seats,
            self.config.max_seats_per_booking,
            request.quoted_total,
        )?)
    }

    async fn try_reserve(
        &self,
        request: ReservationRequest,
        status: PaymentStatus,
        payment_reference: Option<String>,
    ) -> Result<Booking> {
        let seats = self.quote(&request).await?;
        let key = request.screening;

        let _section = self.lock_screening(&key).await?;

        let occupied = self.occupancy.occupied_for(&key).await?;
        let taken: Vec<SeatCoord> = seats
            .iter()
            .map(BookedSeat::coord)
            .filter(|seat| occupied.contains(seat))
            .collect();
        if !taken.is_empty() {
            tracing::warn!(screening = %key, taken = ?taken, "Seats already held");
            return Err(EngineError::SeatConflict { seats: taken });
        }

        let mut booking = Booking::create(request.payer, key, seats, status, self.env.clock.now())?;
        booking.payment_reference = payment_reference;

        match self.env.bookings.insert(&booking).await {
            Ok(()) => {}
            Err(StoreError::SeatsTaken(mut seats)) => {
                seats.sort();
                tracing::warn!(screening = %booking.screening, taken = ?seats, "Store refused overlapping seats");
                return Err(EngineError::SeatConflict { seats });
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to persist booking");
                return Err(error.into());
            }
        }

        tracing::info!(
            booking_id = %booking.id,
            screening = %booking.screening,
            seats = booking.seats.len(),
            total = %booking.total_amount,
            status = %booking.payment_status,
            "Seats reserved"
        );
        Ok(booking)
    }

    /// Enter a screening's critical section, waiting at most the configured bound.
    ///
    /// # Errors
    ///
    /// [`EngineError::Busy`] when the wait bound elapses.
    pub async fn lock_screening(&self, key: &ScreeningKey) -> Result<KeyedGuard<ScreeningKey>> {
        self.locks
            .acquire(key.clone())
            .await
            .map_err(|timeout| EngineError::Busy {
                resource: format!("Screening {}", timeout.key),
            })
    }

    /// Cancel a pending booking, releasing its seats.
    ///
    /// Visibility rules are those of [`ReservationManager::booking`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`]
    /// - [`EngineError::Forbidden`] if `requester` does not own the booking
    /// - [`EngineError::InvalidTransition`] if the booking is already paid or cancelled
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: BookingId, requester: Option<UserId>) -> Result<Booking> {
        let booking = self.booking(id, requester).await?;
        if !booking.payment_status.can_transition_to(PaymentStatus::Cancelled) {
            return Err(EngineError::InvalidTransition {
                from: booking.payment_status,
                to: PaymentStatus::Cancelled,
            });
        }

        let cancelled = self
            .env
            .bookings
            .transition(
                id,
                PaymentStatus::Pending,
                PaymentStatus::Cancelled,
                self.env.clock.now(),
            )
            .await
            .map_err(|error| match error {
                StoreError::StatusConflict { actual, .. } => EngineError::InvalidTransition {
                    from: actual,
                    to: PaymentStatus::Cancelled,
                },
                other => other.into(),
            })?;

        tracing::info!(booking_id = %id, seats = cancelled.seats.len(), "Booking cancelled");
        Ok(cancelled)
    }

    /// Load a booking visible to `requester`.
    ///
    /// An owned booking is visible to its owner only. A guest booking is visible
    /// to anonymous callers holding its id, never to a signed-in user.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] or [`EngineError::Forbidden`].
    pub async fn booking(&self, id: BookingId, requester: Option<UserId>) -> Result<Booking> {
        let booking = self
            .env
            .bookings
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", id))?;

        match (booking.user_id, requester) {
            (Some(owner), requester) if requester != Some(owner) => Err(EngineError::Forbidden(
                "Not authorized to access this booking".to_string(),
            )),
            (None, Some(_)) => Err(EngineError::Forbidden(
                "Guest bookings are not accessible from a signed-in account".to_string(),
            )),
            _ => Ok(booking),
        }
    }

    /// Every booking in any status, newest first (box-office administration).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn all_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.env.bookings.list().await?)
    }

    /// Bookings owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn bookings_for(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self.env.bookings.for_user(user_id).await?)
    }

    /// Resolve the authoritative screen for a screening, checking that it is on sale.
    async fn sellable_screen(&self, key: &ScreeningKey) -> Result<Screen> {
        if self.env.catalog.movie(key.movie_id).await?.is_none() {
            return Err(EngineError::not_found("Movie", key.movie_id));
        }

        let screenings = self
            .env
            .screenings
            .for_movie(key.movie_id, key.show_date)
            .await?;
        let on_screen: Vec<_> = screenings
            .iter()
            .filter(|s| s.screen_id == Some(key.screen_id))
            .collect();
        if on_screen.is_empty() {
            return Err(EngineError::not_found("Screening", key));
        }
        let active: Vec<_> = on_screen
            .into_iter()
            .filter(|s| s.status == ShowingStatus::NowShowing)
            .collect();
        if active.is_empty() {
            return Err(ValidationError::ScreeningNotBookable.into());
        }
        if !active.iter().any(|s| s.show_times.contains(&key.show_time)) {
            return Err(ValidationError::UnscheduledShowTime(key.show_time.clone()).into());
        }

        let screen = self
            .env
            .catalog
            .screen(key.screen_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Screen", key.screen_id))?;
        screen.validate()?;
        Ok(screen)
    }
}
