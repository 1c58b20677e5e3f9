//! # Showtime Engine
//!
//! Scheduling and seat reservation consistency for a cinema box office.
//!
//! ## Components
//!
//! - [`schedule`]: screening time-slot conflicts, checked inside a per-screen-day section
//! - [`occupancy`]: which seats of a screening are held
//! - [`reservation`]: atomic check-and-insert of seat holds, per screening
//! - [`finalizer`]: payment checkout and idempotent finalization by payment reference
//! - [`expiry`]: the sweeper that cancels abandoned pending bookings
//!
//! [`ShowtimeEngine`] wires them together over one [`EngineEnvironment`].
//!
//! ## Example
//!
//! ```ignore
//! let engine = ShowtimeEngine::new(env, EngineConfig::default());
//! let booking = engine.reserve(request).await?;
//! let checkout = engine.initiate_checkout(booking.id, booking.user_id).await?;
//! // ... payer completes the payment ...
//! let paid = engine.finalize(&checkout.reference).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod environment;
pub mod expiry;
pub mod finalizer;
pub mod locks;
pub mod metrics;
pub mod occupancy;
pub mod payment_gateway;
pub mod pricing;
pub mod reservation;
pub mod schedule;

pub use config::EngineConfig;
pub use environment::EngineEnvironment;
pub use expiry::AbandonmentSweeper;
pub use finalizer::{BookingFinalizer, Checkout, CheckoutSnapshot};
pub use occupancy::OccupancyIndex;
pub use payment_gateway::SimulatedPaymentGateway;
pub use pricing::SeatSelection;
pub use reservation::{ReservationManager, ReservationRequest};
pub use schedule::{NewScreening, ScheduleProposal, Scheduler, ScreeningUpdate};

use chrono::NaiveDate;
use showtime_core::{
    Booking, BookingId, MovieId, Result, Screening, ScreeningId, SeatCoord, ShowTime, UserId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The engine facade used by the HTTP layer.
#[derive(Clone)]
pub struct ShowtimeEngine {
    config: EngineConfig,
    env: EngineEnvironment,
    scheduler: Arc<Scheduler>,
    reservations: Arc<ReservationManager>,
    finalizer: Arc<BookingFinalizer>,
}

impl ShowtimeEngine {
    /// Build an engine over `env`
    #[must_use]
    pub fn new(env: EngineEnvironment, config: EngineConfig) -> Self {
        let scheduler = Arc::new(Scheduler::new(env.clone(), config.lock_wait));
        let reservations = Arc::new(ReservationManager::new(env.clone(), config.clone()));
        let finalizer = Arc::new(BookingFinalizer::new(
            env.clone(),
            config.clone(),
            Arc::clone(&reservations),
        ));
        Self {
            config,
            env,
            scheduler,
            reservations,
            finalizer,
        }
    }

    /// Engine configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A sweeper over this engine's environment and abandonment window
    #[must_use]
    pub fn sweeper(&self) -> AbandonmentSweeper {
        AbandonmentSweeper::new(self.env.clone(), self.config.abandonment_window)
    }

    /// See [`Scheduler::check`]
    ///
    /// # Errors
    ///
    /// See [`Scheduler::check`].
    pub async fn check_schedule(&self, proposal: &ScheduleProposal) -> Result<()> {
        self.scheduler.check(proposal).await
    }

    /// See [`Scheduler::create_screening`]
    ///
    /// # Errors
    ///
    /// See [`Scheduler::create_screening`].
    pub async fn create_screening(&self, new: NewScreening) -> Result<Screening> {
        self.scheduler.create_screening(new).await
    }

    /// See [`Scheduler::update_screening`]
    ///
    /// # Errors
    ///
    /// See [`Scheduler::update_screening`].
    pub async fn update_screening(
        &self,
        id: ScreeningId,
        update: ScreeningUpdate,
    ) -> Result<Screening> {
        self.scheduler.update_screening(id, update).await
    }

    /// See [`Scheduler::screening`]
    ///
    /// # Errors
    ///
    /// See [`Scheduler::screening`].
    pub async fn screening(&self, id: ScreeningId) -> Result<Screening> {
        self.scheduler.screening(id).await
    }

    /// See [`Scheduler::list`]
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn screenings(&self, show_date: Option<NaiveDate>) -> Result<Vec<Screening>> {
        self.scheduler.list(show_date).await
    }

    /// See [`OccupancyIndex::occupied_seats`]
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn occupied_seats(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
        show_time: &ShowTime,
    ) -> Result<BTreeSet<SeatCoord>> {
        self.reservations
            .occupancy()
            .occupied_seats(movie_id, show_date, show_time)
            .await
    }

    /// See [`ReservationManager::reserve`]
    ///
    /// # Errors
    ///
    /// See [`ReservationManager::reserve`].
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Booking> {
        self.reservations.reserve(request).await
    }

    /// See [`ReservationManager::booking`]
    ///
    /// # Errors
    ///
    /// See [`ReservationManager::booking`].
    pub async fn booking(&self, id: BookingId, requester: Option<UserId>) -> Result<Booking> {
        self.reservations.booking(id, requester).await
    }

    /// See [`ReservationManager::bookings_for`]
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn bookings_for(&self, user_id: UserId) -> Result<Vec<Booking>> {
        self.reservations.bookings_for(user_id).await
    }

    /// See [`ReservationManager::all_bookings`]
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn all_bookings(&self) -> Result<Vec<Booking>> {
        self.reservations.all_bookings().await
    }

    /// See [`ReservationManager::cancel`]
    ///
    /// # Errors
    ///
    /// See [`ReservationManager::cancel`].
    pub async fn cancel(&self, id: BookingId, requester: Option<UserId>) -> Result<Booking> {
        self.reservations.cancel(id, requester).await
    }

    /// See [`BookingFinalizer::initiate_checkout`]
    ///
    /// # Errors
    ///
    /// See [`BookingFinalizer::initiate_checkout`].
    pub async fn initiate_checkout(
        &self,
        booking_id: BookingId,
        requester: Option<UserId>,
    ) -> Result<Checkout> {
        self.finalizer.initiate_checkout(booking_id, requester).await
    }

    /// See [`BookingFinalizer::initiate_guest_checkout`]
    ///
    /// # Errors
    ///
    /// See [`BookingFinalizer::initiate_guest_checkout`].
    pub async fn initiate_guest_checkout(&self, request: ReservationRequest) -> Result<Checkout> {
        self.finalizer.initiate_guest_checkout(request).await
    }

    /// See [`BookingFinalizer::finalize`]
    ///
    /// # Errors
    ///
    /// See [`BookingFinalizer::finalize`].
    pub async fn finalize(&self, reference: &str) -> Result<Booking> {
        self.finalizer.finalize(reference).await
    }

    /// Enter a screening's reservation section directly (operational tooling and tests)
    ///
    /// # Errors
    ///
    /// [`showtime_core::EngineError::Busy`] when the wait bound elapses.
    pub async fn lock_screening(
        &self,
        key: &showtime_core::ScreeningKey,
    ) -> Result<locks::KeyedGuard<showtime_core::ScreeningKey>> {
        self.reservations.lock_screening(key).await
    }
}
