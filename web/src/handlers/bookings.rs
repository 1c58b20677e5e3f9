//! Booking endpoints.
//!
//! - `GET /api/bookings/occupied-seats` - Seats held for a show (public)
//! - `POST /api/bookings` - Reserve seats, creating a pending booking
//! - `GET /api/bookings` - Every booking, newest first (administration)
//! - `GET /api/bookings/mine` - The caller's bookings, newest first
//! - `GET /api/bookings/:id` - One booking
//! - `POST /api/bookings/:id/cancel` - Cancel a pending booking, releasing its seats
//!
//! Amounts are integer cents. Seats are zero-based `(row, col)` coordinates;
//! responses also carry their `row-col` keys and `A1`-style labels.

use crate::error::AppError;
use crate::extractors::{Payer, SignedInUser};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use showtime_core::{
    BookedSeat, Booking, BookingId, BookingStatus, Money, MovieId, PaymentStatus, ScreenId,
    ScreeningKey, ShowTime, UserId,
};
use showtime_engine::{ReservationRequest, SeatSelection};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query for the occupied seats of one show.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedSeatsQuery {
    /// Movie
    pub movie: MovieId,
    /// Calendar day (`YYYY-MM-DD`)
    pub show_date: NaiveDate,
    /// Time label, e.g. `7:00 PM`
    pub show_time: ShowTime,
}

/// Seats held for a show.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedSeatsResponse {
    /// `row-col` keys, sorted by row then column
    pub occupied_seats: Vec<String>,
    /// Display labels in the same order
    pub seat_numbers: Vec<String>,
}

/// Seats to reserve for one show.
///
/// Also embedded as `bookingData` in guest payment intents.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Movie
    pub movie: MovieId,
    /// Screen
    pub screen: ScreenId,
    /// Calendar day
    pub show_date: NaiveDate,
    /// Time label
    pub show_time: ShowTime,
    /// Seats with the prices the seat map showed
    pub seats: Vec<SeatSelection>,
    /// Total the client displayed
    #[serde(default)]
    pub total_amount: Option<Money>,
}

impl CreateBookingRequest {
    /// Engine request on behalf of `payer`
    #[must_use]
    pub fn into_reservation(self, payer: Option<UserId>) -> ReservationRequest {
        ReservationRequest {
            screening: ScreeningKey {
                movie_id: self.movie,
                screen_id: self.screen,
                show_date: self.show_date,
                show_time: self.show_time,
            },
            seats: self.seats,
            payer,
            quoted_total: self.total_amount,
        }
    }
}

/// A booked seat.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    /// Row index
    pub row: u32,
    /// Column index
    pub col: u32,
    /// `row-col` key
    pub key: String,
    /// Display label
    pub seat_number: String,
    /// Price fixed at booking time
    pub price: Money,
}

impl From<&BookedSeat> for SeatView {
    fn from(seat: &BookedSeat) -> Self {
        Self {
            row: seat.row,
            col: seat.col,
            key: seat.coord().key(),
            seat_number: seat.seat_number.clone(),
            price: seat.price,
        }
    }
}

/// Booking details.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    /// Booking ID
    pub id: BookingId,
    /// Owner; `None` for guests
    pub user_id: Option<UserId>,
    /// Movie
    pub movie: MovieId,
    /// Screen
    pub screen: ScreenId,
    /// Calendar day
    pub show_date: NaiveDate,
    /// Time label
    pub show_time: ShowTime,
    /// Seats
    pub seats: Vec<SeatView>,
    /// Sum of seat prices
    pub total_amount: Money,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Booking state
    pub booking_status: BookingStatus,
    /// Payment reference, once checkout started
    pub payment_reference: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last transition
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            movie: booking.screening.movie_id,
            screen: booking.screening.screen_id,
            show_date: booking.screening.show_date,
            show_time: booking.screening.show_time,
            seats: booking.seats.iter().map(SeatView::from).collect(),
            total_amount: booking.total_amount,
            payment_status: booking.payment_status,
            booking_status: booking.booking_status,
            payment_reference: booking.payment_reference,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Seats held by pending or paid bookings of a show.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:8080/api/bookings/occupied-seats?movie=<id>&showDate=2025-06-01&showTime=7:00%20PM"
/// ```
///
/// # Errors
///
/// 500 on storage failure.
pub async fn occupied_seats(
    State(state): State<AppState>,
    Query(query): Query<OccupiedSeatsQuery>,
) -> Result<Json<OccupiedSeatsResponse>, AppError> {
    let seats = state
        .engine
        .occupied_seats(query.movie, query.show_date, &query.show_time)
        .await?;

    Ok(Json(OccupiedSeatsResponse {
        occupied_seats: seats.iter().map(|s| s.key()).collect(),
        seat_numbers: seats.iter().map(|s| s.label()).collect(),
    }))
}

/// Reserve seats. The booking starts `Pending` and holds its seats until paid,
/// cancelled, or abandoned.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "X-User-Id: 550e8400-e29b-41d4-a716-446655440000" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "movie": "...", "screen": "...",
///     "showDate": "2025-06-01", "showTime": "7:00 PM",
///     "seats": [{"row": 0, "col": 0, "price": 20000}],
///     "totalAmount": 20000
///   }'
/// ```
///
/// # Errors
///
/// - 400 for an invalid seat selection or mismatched prices
/// - 404 if the screening or screen does not exist
/// - 400 `SEAT_CONFLICT` with the contested `seats` if any are already held
/// - 503 if the show is contended past the wait bound
pub async fn create_booking(
    Payer(payer): Payer,
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = state
        .engine
        .reserve(request.into_reservation(payer))
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// The signed-in caller's bookings, newest first.
///
/// # Errors
///
/// 401 without an `X-User-Id` header.
pub async fn my_bookings(
    SignedInUser(user): SignedInUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.engine.bookings_for(user).await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// Every booking in any status, newest first.
///
/// Admin gating is left to the gateway in front of this service, like the
/// `X-User-Id` identity itself.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_bookings(
    State(state): State<AppState>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.engine.all_bookings().await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// One booking. Owned bookings are visible to their owner only; guest
/// bookings to anonymous callers only.
///
/// # Errors
///
/// 404 if absent, 403 if the caller may not see it.
pub async fn get_booking(
    Payer(payer): Payer,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.engine.booking(id, payer).await?;
    Ok(Json(booking.into()))
}

/// Cancel a pending booking and release its seats.
///
/// # Errors
///
/// - 400 if the booking is already paid or cancelled
/// - 403 if it belongs to someone else
/// - 404 if absent
pub async fn cancel_booking(
    Payer(payer): Payer,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.engine.cancel(id, payer).await?;
    Ok(Json(booking.into()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_accepts_client_payload() {
        let movie = MovieId::new();
        let screen = ScreenId::new();
        let request: CreateBookingRequest = serde_json::from_value(json!({
            "movie": movie,
            "screen": screen,
            "showDate": "2025-06-01",
            "showTime": "7:00 PM",
            "seats": [{"row": 0, "col": 0, "price": 35000}, {"row": 0, "col": 1}],
            "totalAmount": 55000
        }))
        .unwrap();

        let reservation = request.into_reservation(None);
        assert_eq!(reservation.screening.movie_id, movie);
        assert_eq!(reservation.screening.show_time, ShowTime::new("7:00 PM"));
        assert_eq!(reservation.seats[0].quoted_price, Some(Money::from_cents(35_000)));
        assert_eq!(reservation.seats[1].quoted_price, None);
        assert_eq!(reservation.quoted_total, Some(Money::from_cents(55_000)));
    }
}
