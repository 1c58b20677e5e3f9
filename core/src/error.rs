//! Error taxonomy for the booking engine.
//!
//! Every error here is recoverable by the caller: fix the input, re-select seats,
//! or retry. None of them is fatal to the process.

use crate::payment::PaymentOutcome;
use crate::types::{BookingId, Money, PaymentStatus, ScreeningId, SeatCoord, ShowTime};
use thiserror::Error;

/// Input rejected before any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No seats in the request
    #[error("No seats selected")]
    EmptySeatSet,

    /// The same coordinate appears twice
    #[error("Seat {0} selected more than once")]
    DuplicateSeat(SeatCoord),

    /// Coordinate outside the screen grid
    #[error("Seat {seat} is outside the screen ({rows} rows x {cols} cols)")]
    SeatOutOfBounds {
        /// Offending seat
        seat: SeatCoord,
        /// Screen rows
        rows: u32,
        /// Screen columns
        cols: u32,
    },

    /// More seats than a single booking may hold
    #[error("Cannot book more than {max} seats at once (requested: {requested})")]
    TooManySeats {
        /// Seats requested
        requested: usize,
        /// Configured maximum
        max: usize,
    },

    /// Client-quoted seat price differs from the screen's price table
    #[error("Price {quoted} quoted for seat {seat} does not match {actual}")]
    PriceMismatch {
        /// Seat
        seat: SeatCoord,
        /// Price sent by the client
        quoted: Money,
        /// Price resolved from the screen
        actual: Money,
    },

    /// Client-quoted total differs from the sum of seat prices
    #[error("Total {quoted} does not match the sum of seat prices {actual}")]
    TotalMismatch {
        /// Total sent by the client
        quoted: Money,
        /// Computed total
        actual: Money,
    },

    /// The screening does not run at the requested time
    #[error("No show at {0} is scheduled for this screening")]
    UnscheduledShowTime(ShowTime),

    /// The screening exists but is not on sale
    #[error("Screening is not open for booking")]
    ScreeningNotBookable,

    /// A required field was absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Declared capacity disagrees with the grid
    #[error("Screen {screen} declares {declared} seats but its grid is {rows}x{cols}")]
    InconsistentCapacity {
        /// Screen name
        screen: String,
        /// Declared total seats
        declared: u32,
        /// Rows
        rows: u32,
        /// Columns
        cols: u32,
    },

    /// A payment was already started for this booking
    #[error("Checkout already started for this booking (payment {0})")]
    CheckoutInProgress(String),

    /// Seat prices do not fit in the money type
    #[error("Booking total overflows")]
    AmountOverflow,
}

/// Errors raised by booking/screening stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional insert refused: these seats are held by another booking
    #[error("Seats already taken: {0:?}")]
    SeatsTaken(Vec<SeatCoord>),

    /// Another booking already carries this payment reference
    #[error("Payment reference {0} already recorded")]
    DuplicatePaymentReference(String),

    /// Compare-and-set transition lost a race
    #[error("Booking {booking_id} is {actual}, expected {expected}")]
    StatusConflict {
        /// Booking
        booking_id: BookingId,
        /// Status the caller expected
        expected: PaymentStatus,
        /// Status actually stored
        actual: PaymentStatus,
    },

    /// Booking does not exist
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Screening does not exist
    #[error("Screening not found: {0}")]
    ScreeningNotFound(ScreeningId),

    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the external payment capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The capability has no record of this reference
    #[error("Payment reference not found: {0}")]
    NotFound(String),

    /// Transport or provider failure
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Metadata could not be encoded/decoded
    #[error("Payment metadata error: {0}")]
    Metadata(String),
}

/// Errors surfaced by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Invalid input
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Proposed time slots collide with another screening on the same screen and day
    #[error(
        "Conflict! Show at {} is already booked on {screen_name} for this date.",
        join_times(.conflicting_times)
    )]
    ScheduleConflict {
        /// Screen display name
        screen_name: String,
        /// Overlapping labels, sorted
        conflicting_times: Vec<ShowTime>,
    },

    /// Some requested seats were claimed first
    #[error("Seats already taken: {}", join_seats(.seats))]
    SeatConflict {
        /// Seats that are no longer available
        seats: Vec<SeatCoord>,
    },

    /// Payment exists but has not succeeded
    #[error("Payment {reference} not completed (status: {status})")]
    PaymentNotCompleted {
        /// Payment reference
        reference: String,
        /// Outcome reported by the capability
        status: PaymentOutcome,
    },

    /// Payment reference unknown to the capability
    #[error("Payment reference not found: {0}")]
    PaymentReferenceNotFound(String),

    /// Movie, screen, screening or booking missing
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Critical section not acquired within the bounded wait
    #[error("{resource} is busy, retry shortly")]
    Busy {
        /// What was contended
        resource: String,
    },

    /// Requested status change is not allowed by the state machine
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: PaymentStatus,
        /// Requested status
        to: PaymentStatus,
    },

    /// Caller does not own the booking
    #[error("{0}")]
    Forbidden(String),

    /// Unexpected storage failure
    #[error(transparent)]
    Storage(StoreError),

    /// Unexpected payment capability failure
    #[error(transparent)]
    Payment(PaymentError),
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether retrying (possibly with a different seat set) can succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::SeatConflict { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SeatsTaken(seats) => Self::SeatConflict { seats },
            StoreError::BookingNotFound(id) => Self::not_found("Booking", id),
            StoreError::ScreeningNotFound(id) => Self::not_found("Screening", id),
            other => Self::Storage(other),
        }
    }
}

impl From<PaymentError> for EngineError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::NotFound(reference) => Self::PaymentReferenceNotFound(reference),
            other => Self::Payment(other),
        }
    }
}

fn join_times(times: &[ShowTime]) -> String {
    times
        .iter()
        .map(ShowTime::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_seats(seats: &[SeatCoord]) -> String {
    seats
        .iter()
        .map(SeatCoord::label)
        .collect::<Vec<_>>()
        .join(", ")
}
