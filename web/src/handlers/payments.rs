//! Payment endpoints.
//!
//! - `POST /api/payments/create-payment-intent` - Start payment for a pending
//!   booking (`bookingId`) or for a guest selection carried in the payment
//!   itself (`bookingData`)
//! - `POST /api/payments/verify` - Finalize a payment by reference; safe to repeat

use super::bookings::{BookingResponse, CreateBookingRequest};
use crate::error::AppError;
use crate::extractors::Payer;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use showtime_core::{BookingId, EngineError, Money, ValidationError};
use showtime_engine::Checkout;

/// Request to start a payment. Exactly one of the fields is expected;
/// `bookingId` wins when both are sent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    /// Pending booking to pay for
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    /// Seat selection to book once the payment succeeds
    #[serde(default)]
    pub booking_data: Option<CreateBookingRequest>,
}

/// A started payment.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    /// Secret the paying client confirms the payment with
    pub client_secret: String,
    /// Reference to verify with
    pub payment_reference: String,
    /// Amount in cents
    pub amount: Money,
    /// Currency code
    pub currency: String,
    /// Pending booking, if the payment is for one
    pub booking_id: Option<BookingId>,
}

impl From<Checkout> for PaymentIntentResponse {
    fn from(checkout: Checkout) -> Self {
        Self {
            client_secret: checkout.client_secret,
            payment_reference: checkout.reference,
            amount: checkout.amount,
            currency: checkout.currency,
            booking_id: checkout.booking_id,
        }
    }
}

/// Request to finalize a payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    /// Payment reference returned by `create-payment-intent`
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Start a payment.
///
/// # Errors
///
/// - 400 when neither field is present, the booking is no longer pending, or
///   a checkout was already started for it
/// - 403/404 for someone else's or an unknown booking
/// - 400 `SEAT_CONFLICT` when a guest selection is already taken
pub async fn create_payment_intent(
    Payer(payer): Payer,
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    let checkout = match (request.booking_id, request.booking_data) {
        (Some(booking_id), _) => state.engine.initiate_checkout(booking_id, payer).await?,
        (None, Some(data)) => {
            state
                .engine
                .initiate_guest_checkout(data.into_reservation(payer))
                .await?
        }
        (None, None) => {
            return Err(AppError::bad_request(
                "Either bookingId or bookingData is required",
            ))
        }
    };

    tracing::info!(
        reference = %checkout.reference,
        amount = %checkout.amount,
        booking_id = ?checkout.booking_id,
        "Payment intent created"
    );

    Ok(Json(checkout.into()))
}

/// Finalize a payment: the pending booking becomes paid, or a guest booking
/// is created from the payment. Repeating the call returns the same booking.
///
/// # Errors
///
/// - 400 if the payment has not succeeded
/// - 404 for an unknown reference
/// - 400 `SEAT_CONFLICT` if a guest's seats were taken before the payment completed
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let reference = request
        .payment_intent_id
        .filter(|r| !r.trim().is_empty())
        .ok_or(EngineError::Validation(ValidationError::MissingField(
            "paymentIntentId",
        )))?;

    let booking = state.engine.finalize(reference.trim()).await?;
    Ok(Json(booking.into()))
}
