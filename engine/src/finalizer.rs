//! Payment-gated booking finalization.
//!
//! Checkout hands the booking's screening, seats and prices to the payment
//! capability as metadata and records the returned reference. Finalization looks
//! the payment up by that reference: a succeeded payment either promotes the
//! pending booking to paid or, for guest checkouts, materializes a paid booking
//! from the metadata through the same atomic reservation path as any other
//! booking. The reference is the idempotency key, and finalize calls for one
//! reference are serialized. Checkouts for one booking are serialized too, so a
//! booking is never handed two payment references.

use crate::config::EngineConfig;
use crate::environment::EngineEnvironment;
use crate::locks::KeyedLocks;
use crate::metrics::record_finalization;
use crate::pricing::SeatSelection;
use crate::reservation::{ReservationManager, ReservationRequest};
use serde::{Deserialize, Serialize};
use showtime_core::payment::{PaymentMetadata, PaymentOutcome};
use showtime_core::{
    Booking, BookingId, EngineError, Money, PaymentError, PaymentStatus, Result, ScreeningKey,
    StoreError, UserId, ValidationError,
};
use std::sync::Arc;

/// Metadata key under which the checkout snapshot is stored.
pub const BOOKING_METADATA_KEY: &str = "booking";

/// Everything needed to recreate a booking, carried in payment metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    /// Pending booking the payment is for, if one was reserved first
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    /// Screening
    pub screening: ScreeningKey,
    /// Seats with the prices the payer was charged
    pub seats: Vec<SeatSelection>,
    /// Payer
    #[serde(default)]
    pub payer: Option<UserId>,
    /// Amount charged
    pub total: Money,
}

impl CheckoutSnapshot {
    fn from_booking(booking: &Booking) -> Self {
        Self {
            booking_id: Some(booking.id),
            screening: booking.screening.clone(),
            seats: booking
                .seats
                .iter()
                .map(|seat| SeatSelection::quoted(seat.row, seat.col, seat.price))
                .collect(),
            payer: booking.user_id,
            total: booking.total_amount,
        }
    }

    fn into_metadata(self) -> Result<PaymentMetadata> {
        let encoded = serde_json::to_string(&self)
            .map_err(|e| EngineError::Payment(PaymentError::Metadata(e.to_string())))?;
        Ok(PaymentMetadata::from([(BOOKING_METADATA_KEY.to_string(), encoded)]))
    }

    fn from_metadata(metadata: &PaymentMetadata) -> Result<Self> {
        let encoded = metadata
            .get(BOOKING_METADATA_KEY)
            .ok_or(ValidationError::MissingField(BOOKING_METADATA_KEY))?;
        serde_json::from_str(encoded)
            .map_err(|e| EngineError::Payment(PaymentError::Metadata(e.to_string())))
    }
}

/// A started payment, returned to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    /// Pending booking the payment is for; `None` for guest checkout
    pub booking_id: Option<BookingId>,
    /// Payment reference to finalize with
    pub reference: String,
    /// Secret for the paying client
    pub client_secret: String,
    /// Amount requested
    pub amount: Money,
    /// Currency
    pub currency: String,
}

/// Runs checkout and payment finalization.
pub struct BookingFinalizer {
    env: EngineEnvironment,
    config: EngineConfig,
    reservations: Arc<ReservationManager>,
    locks: KeyedLocks<String>,
    checkouts: KeyedLocks<BookingId>,
}

impl BookingFinalizer {
    /// Creates a finalizer that materializes bookings through `reservations`
    #[must_use]
    pub fn new(
        env: EngineEnvironment,
        config: EngineConfig,
        reservations: Arc<ReservationManager>,
    ) -> Self {
        let locks = KeyedLocks::new(config.lock_wait);
        let checkouts = KeyedLocks::new(config.lock_wait);
        Self {
            env,
            config,
            reservations,
            locks,
            checkouts,
        }
    }

    /// Start payment for a pending booking and record the reference on it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] / [`EngineError::Forbidden`] for the booking
    /// - [`EngineError::InvalidTransition`] if the booking is no longer pending
    /// - [`ValidationError::CheckoutInProgress`] if a payment was already started
    /// - [`EngineError::Payment`] if the capability refuses
    /// - [`EngineError::Busy`] if the booking is contended past the wait bound
    #[tracing::instrument(skip(self))]
    pub async fn initiate_checkout(
        &self,
        booking_id: BookingId,
        requester: Option<UserId>,
    ) -> Result<Checkout> {
        let _section = self
            .checkouts
            .acquire(booking_id)
            .await
            .map_err(|timeout| EngineError::Busy {
                resource: format!("Booking {}", timeout.key),
            })?;

        let booking = self.reservations.booking(booking_id, requester).await?;
        if booking.payment_status != PaymentStatus::Pending {
            return Err(EngineError::InvalidTransition {
                from: booking.payment_status,
                to: PaymentStatus::Paid,
            });
        }
        if let Some(reference) = booking.payment_reference {
            return Err(ValidationError::CheckoutInProgress(reference).into());
        }

        let metadata = CheckoutSnapshot::from_booking(&booking).into_metadata()?;
        let intent = self
            .env
            .payments
            .initiate(booking.total_amount, &self.config.currency, metadata)
            .await?;

        self.env
            .bookings
            .attach_payment_reference(booking_id, &intent.reference, self.env.clock.now())
            .await
            .map_err(|error| match error {
                StoreError::StatusConflict { actual, .. } => EngineError::InvalidTransition {
                    from: actual,
                    to: PaymentStatus::Paid,
                },
                // Another process attached its reference first; ours stays unused.
                StoreError::DuplicatePaymentReference(existing) => {
                    tracing::warn!(
                        booking_id = %booking_id,
                        orphaned = %intent.reference,
                        winner = %existing,
                        "Concurrent checkout lost the race"
                    );
                    ValidationError::CheckoutInProgress(existing).into()
                }
                other => other.into(),
            })?;

        tracing::info!(
            booking_id = %booking_id,
            reference = %intent.reference,
            amount = %booking.total_amount,
            "Checkout started"
        );

        Ok(Checkout {
            booking_id: Some(booking_id),
            reference: intent.reference,
            client_secret: intent.client_secret,
            amount: booking.total_amount,
            currency: self.config.currency.clone(),
        })
    }

    /// Start payment for seats that are not reserved yet.
    ///
    /// The booking exists only in the payment metadata until [`BookingFinalizer::finalize`]
    /// materializes it. Seats already held are refused up front, but nothing is
    /// held while the payer pays.
    ///
    /// # Errors
    ///
    /// Validation and lookup errors as for a reservation, [`EngineError::SeatConflict`]
    /// for seats that are already held, and [`EngineError::Payment`] if the
    /// capability refuses.
    #[tracing::instrument(skip(self, request), fields(screening = %request.screening))]
    pub async fn initiate_guest_checkout(&self, request: ReservationRequest) -> Result<Checkout> {
        let seats = self.reservations.quote(&request).await?;
        let occupied = self
            .reservations
            .occupancy()
            .occupied_for(&request.screening)
            .await?;
        let taken: Vec<_> = seats
            .iter()
            .map(showtime_core::BookedSeat::coord)
            .filter(|seat| occupied.contains(seat))
            .collect();
        if !taken.is_empty() {
            return Err(EngineError::SeatConflict { seats: taken });
        }

        let total = Money::checked_sum(seats.iter().map(|seat| seat.price))
            .ok_or(ValidationError::AmountOverflow)?;
        let snapshot = CheckoutSnapshot {
            booking_id: None,
            screening: request.screening,
            seats: seats
                .iter()
                .map(|seat| SeatSelection::quoted(seat.row, seat.col, seat.price))
                .collect(),
            payer: request.payer,
            total,
        };

        let intent = self
            .env
            .payments
            .initiate(total, &self.config.currency, snapshot.into_metadata()?)
            .await?;

        tracing::info!(reference = %intent.reference, amount = %total, "Guest checkout started");

        Ok(Checkout {
            booking_id: None,
            reference: intent.reference,
            client_secret: intent.client_secret,
            amount: total,
            currency: self.config.currency.clone(),
        })
    }

    /// Finalize a booking once its payment has succeeded.
    ///
    /// Calling this again with the same reference returns the same booking.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PaymentReferenceNotFound`] for an unknown reference
    /// - [`EngineError::PaymentNotCompleted`] if the payment has not succeeded
    /// - [`EngineError::InvalidTransition`] if the booking was cancelled before payment landed
    /// - [`ValidationError::TotalMismatch`] if the amount paid is not the booking's total
    /// - [`EngineError::SeatConflict`] if a guest checkout's seats were taken meanwhile
    /// - [`EngineError::Busy`] if the reference is contended past the wait bound
    #[tracing::instrument(skip(self))]
    pub async fn finalize(&self, reference: &str) -> Result<Booking> {
        let _section = self
            .locks
            .acquire(reference.to_string())
            .await
            .map_err(|timeout| EngineError::Busy {
                resource: format!("Payment {}", timeout.key),
            })?;

        let outcome = self.try_finalize(reference).await;
        let replayed = matches!(&outcome, Ok((_, true)));
        let outcome = outcome.map(|(booking, _)| booking);
        record_finalization(&outcome, replayed);
        outcome
    }

    /// Returns the booking and whether it was already finalized.
    async fn try_finalize(&self, reference: &str) -> Result<(Booking, bool)> {
        let existing = self.env.bookings.find_by_payment_reference(reference).await?;
        if let Some(booking) = &existing {
            match booking.payment_status {
                PaymentStatus::Paid => {
                    tracing::debug!(booking_id = %booking.id, "Payment already finalized");
                    return Ok((booking.clone(), true));
                }
                PaymentStatus::Cancelled => return Err(Self::cancelled_before_payment(booking)),
                PaymentStatus::Pending => {}
            }
        }

        let record = self.env.payments.retrieve(reference).await?;
        if record.status != PaymentOutcome::Succeeded {
            tracing::warn!(reference, status = %record.status, "Payment not completed");
            return Err(EngineError::PaymentNotCompleted {
                reference: reference.to_string(),
                status: record.status,
            });
        }

        if let Some(booking) = existing {
            if record.amount != booking.total_amount {
                tracing::error!(
                    booking_id = %booking.id,
                    reference,
                    paid = %record.amount,
                    total = %booking.total_amount,
                    "Amount paid does not match the booking total"
                );
                return Err(ValidationError::TotalMismatch {
                    quoted: record.amount,
                    actual: booking.total_amount,
                }
                .into());
            }
            return self.promote(&booking).await.map(|paid| (paid, false));
        }

        let snapshot = CheckoutSnapshot::from_metadata(&record.metadata)?;
        let request = ReservationRequest {
            screening: snapshot.screening,
            seats: snapshot.seats,
            payer: snapshot.payer,
            quoted_total: Some(record.amount),
        };

        match self
            .reservations
            .reserve_as(request, PaymentStatus::Paid, Some(reference.to_string()))
            .await
        {
            Ok(booking) => {
                tracing::info!(booking_id = %booking.id, reference, "Paid booking created from payment");
                Ok((booking, false))
            }
            // Another process finalized the same reference between our lookup and insert.
            Err(EngineError::Storage(StoreError::DuplicatePaymentReference(_))) => {
                let booking = self
                    .env
                    .bookings
                    .find_by_payment_reference(reference)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Booking", reference))?;
                Ok((booking, true))
            }
            Err(error) => {
                if matches!(error, EngineError::SeatConflict { .. }) {
                    tracing::error!(
                        reference,
                        error = %error,
                        "Payment succeeded but seats are no longer available"
                    );
                }
                Err(error)
            }
        }
    }

    async fn promote(&self, booking: &Booking) -> Result<Booking> {
        let now = self.env.clock.now();
        match self
            .env
            .bookings
            .transition(booking.id, PaymentStatus::Pending, PaymentStatus::Paid, now)
            .await
        {
            Ok(paid) => {
                tracing::info!(booking_id = %paid.id, seats = paid.seats.len(), "Booking paid");
                Ok(paid)
            }
            Err(StoreError::StatusConflict {
                actual: PaymentStatus::Cancelled,
                ..
            }) => Err(Self::cancelled_before_payment(booking)),
            Err(StoreError::StatusConflict {
                actual: PaymentStatus::Paid,
                ..
            }) => self
                .env
                .bookings
                .get(booking.id)
                .await?
                .ok_or_else(|| EngineError::not_found("Booking", booking.id)),
            Err(error) => Err(error.into()),
        }
    }

    fn cancelled_before_payment(booking: &Booking) -> EngineError {
        tracing::error!(
            booking_id = %booking.id,
            reference = ?booking.payment_reference,
            "Payment landed on a cancelled booking, refund required"
        );
        EngineError::InvalidTransition {
            from: PaymentStatus::Cancelled,
            to: PaymentStatus::Paid,
        }
    }
}
