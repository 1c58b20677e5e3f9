//! Domain types for the Showtime booking engine.
//!
//! Value objects (identifiers, money, seat coordinates, show times), catalog
//! records (screens, movies), scheduling entities (screenings) and bookings.

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a movie in the catalog
    MovieId
);
uuid_id!(
    /// Unique identifier for a physical screen (auditorium)
    ScreenId
);
uuid_id!(
    /// Unique identifier for a scheduled screening
    ScreeningId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a user (payer)
    UserId
);

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Money in minor currency units (cents). The currency itself is configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from major units with overflow checking
    #[must_use]
    pub const fn checked_from_major(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Sums an iterator of amounts, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Seats
// ============================================================================

/// A coordinate into a screen's seat grid (both zero-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatCoord {
    /// Row index
    pub row: u32,
    /// Column index
    pub col: u32,
}

impl SeatCoord {
    /// Creates a seat coordinate
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Display label: row letter(s) plus 1-based column (`(0, 0)` is `A1`, row 26 is `AA`).
    #[must_use]
    pub fn label(&self) -> String {
        let mut letters = Vec::new();
        let mut n = u64::from(self.row) + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
            n = (n - 1) / 26;
        }
        let row: String = letters.into_iter().rev().collect();
        format!("{row}{}", u64::from(self.col) + 1)
    }

    /// Compact `row-col` key used by seat-map clients.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.row, self.col)
    }
}

impl fmt::Display for SeatCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A seat held by a booking, with the price fixed at booking time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSeat {
    /// Row index
    pub row: u32,
    /// Column index
    pub col: u32,
    /// Display label (e.g. `C7`)
    pub seat_number: String,
    /// Price charged for this seat
    pub price: Money,
}

impl BookedSeat {
    /// Creates a booked seat, deriving its label from the coordinate
    #[must_use]
    pub fn new(coord: SeatCoord, price: Money) -> Self {
        Self {
            row: coord.row,
            col: coord.col,
            seat_number: coord.label(),
            price,
        }
    }

    /// The seat's grid coordinate
    #[must_use]
    pub const fn coord(&self) -> SeatCoord {
        SeatCoord::new(self.row, self.col)
    }
}

// ============================================================================
// Catalog: screens and movies
// ============================================================================

/// Inclusive rectangle of seats sharing a seat type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatZone {
    /// First row (inclusive)
    pub row_start: u32,
    /// Last row (inclusive)
    pub row_end: u32,
    /// First column (inclusive)
    pub col_start: u32,
    /// Last column (inclusive)
    pub col_end: u32,
}

impl SeatZone {
    /// Zone covering whole rows `row_start..=row_end`
    #[must_use]
    pub const fn rows(row_start: u32, row_end: u32) -> Self {
        Self {
            row_start,
            row_end,
            col_start: 0,
            col_end: u32::MAX,
        }
    }

    /// Whether the zone contains the seat
    #[must_use]
    pub const fn contains(&self, seat: SeatCoord) -> bool {
        seat.row >= self.row_start
            && seat.row <= self.row_end
            && seat.col >= self.col_start
            && seat.col <= self.col_end
    }
}

/// A priced category of seats on a screen (e.g. Standard, Executive).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatType {
    /// Category name
    pub name: String,
    /// Price per seat
    pub price: Money,
    /// Seats belonging to this category; `None` means the type is listed but unmapped
    pub zone: Option<SeatZone>,
}

/// Static capacity descriptor of a physical screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    /// Screen ID
    pub id: ScreenId,
    /// Display name (e.g. "Silver")
    pub name: String,
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u32,
    /// Declared capacity, must equal `rows * cols`
    pub total_seats: u32,
    /// Seat categories and their prices
    pub seat_types: Vec<SeatType>,
}

impl Screen {
    /// Creates a screen whose capacity is derived from its grid
    #[must_use]
    pub fn new(name: impl Into<String>, rows: u32, cols: u32, seat_types: Vec<SeatType>) -> Self {
        Self {
            id: ScreenId::new(),
            name: name.into(),
            rows,
            cols,
            total_seats: rows.saturating_mul(cols),
            seat_types,
        }
    }

    /// Whether the coordinate lies inside the grid
    #[must_use]
    pub const fn contains(&self, seat: SeatCoord) -> bool {
        seat.row < self.rows && seat.col < self.cols
    }

    /// First seat type whose zone contains the seat
    #[must_use]
    pub fn seat_type_for(&self, seat: SeatCoord) -> Option<&SeatType> {
        self.seat_types
            .iter()
            .find(|t| t.zone.is_some_and(|zone| zone.contains(seat)))
    }

    /// Checks the `total_seats == rows * cols` invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InconsistentCapacity`] when the declared capacity is off.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if u64::from(self.total_seats) == u64::from(self.rows) * u64::from(self.cols) {
            Ok(())
        } else {
            Err(ValidationError::InconsistentCapacity {
                screen: self.name.clone(),
                declared: self.total_seats,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

/// Whether a movie/screening is actively scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShowingStatus {
    /// Actively scheduled and sellable
    #[default]
    #[serde(rename = "Now Showing")]
    NowShowing,
    /// Announced but not yet releasing
    #[serde(rename = "Coming Soon")]
    ComingSoon,
}

impl ShowingStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NowShowing => "Now Showing",
            Self::ComingSoon => "Coming Soon",
        }
    }
}

impl FromStr for ShowingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Now Showing" => Ok(Self::NowShowing),
            "Coming Soon" => Ok(Self::ComingSoon),
            other => Err(format!("unknown showing status: {other}")),
        }
    }
}

/// Catalog record for a movie. Scheduling lives on [`Screening`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Movie ID
    pub id: MovieId,
    /// Title
    pub title: String,
    /// Runtime in minutes
    pub duration_minutes: u32,
    /// Release status
    pub status: ShowingStatus,
    /// Release date, if announced
    pub release_date: Option<NaiveDate>,
}

impl Movie {
    /// Creates a movie that is now showing
    #[must_use]
    pub fn new(title: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            id: MovieId::new(),
            title: title.into(),
            duration_minutes,
            status: ShowingStatus::NowShowing,
            release_date: None,
        }
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Opaque show time label such as `"9:30 PM"`. Compared as a string, never parsed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowTime(String);

impl ShowTime {
    /// Creates a show time label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The raw label
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShowTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShowTime {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Identity of one sellable performance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreeningKey {
    /// Movie being shown
    pub movie_id: MovieId,
    /// Screen it is shown on
    pub screen_id: ScreenId,
    /// Local calendar date
    pub show_date: NaiveDate,
    /// Time slot label
    pub show_time: ShowTime,
}

impl fmt::Display for ScreeningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{} {}",
            self.movie_id, self.screen_id, self.show_date, self.show_time
        )
    }
}

/// A movie scheduled on a screen for one calendar day, with its time slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screening {
    /// Screening ID
    pub id: ScreeningId,
    /// Movie shown
    pub movie_id: MovieId,
    /// Assigned screen (unassigned screenings never conflict)
    pub screen_id: Option<ScreenId>,
    /// Local calendar date
    pub show_date: NaiveDate,
    /// Time slot labels
    pub show_times: BTreeSet<ShowTime>,
    /// Whether the screening is actively scheduled
    pub status: ShowingStatus,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Screening {
    /// Whether this screening takes part in conflict checking.
    #[must_use]
    pub fn occupies_slots(&self) -> bool {
        self.status == ShowingStatus::NowShowing
            && self.screen_id.is_some()
            && !self.show_times.is_empty()
    }

    /// The sellable key for one of this screening's slots, if it has that slot.
    #[must_use]
    pub fn key_for(&self, show_time: &ShowTime) -> Option<ScreeningKey> {
        let screen_id = self.screen_id?;
        self.show_times.contains(show_time).then(|| ScreeningKey {
            movie_id: self.movie_id,
            screen_id,
            show_date: self.show_date,
            show_time: show_time.clone(),
        })
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Payment state of a booking. `Paid` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Seats held, awaiting payment
    Pending,
    /// Payment confirmed
    Paid,
    /// Cancelled or abandoned
    Cancelled,
}

impl PaymentStatus {
    /// Whether the state machine allows `self -> next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
        )
    }

    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Booking state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Booking holds its seats
    Confirmed,
    /// Booking released its seats
    Cancelled,
}

impl BookingStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// A claim on a set of seats for one screening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Owner; `None` for guest checkout
    pub user_id: Option<UserId>,
    /// Screening the seats belong to
    pub screening: ScreeningKey,
    /// Seats held, each with its price
    pub seats: Vec<BookedSeat>,
    /// Sum of seat prices
    pub total_amount: Money,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Booking state
    pub booking_status: BookingStatus,
    /// External payment reference (idempotency key for finalization)
    pub payment_reference: Option<String>,
    /// When created (starts the abandonment window)
    pub created_at: DateTime<Utc>,
    /// When last transitioned
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Builds a confirmed booking, enforcing the seat and total invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the seat set is empty, has duplicates,
    /// or the total overflows.
    pub fn create(
        user_id: Option<UserId>,
        screening: ScreeningKey,
        seats: Vec<BookedSeat>,
        payment_status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_distinct(seats.iter().map(BookedSeat::coord))?;
        let total_amount = Money::checked_sum(seats.iter().map(|s| s.price))
            .ok_or(ValidationError::AmountOverflow)?;

        Ok(Self {
            id: BookingId::new(),
            user_id,
            screening,
            seats,
            total_amount,
            payment_status,
            booking_status: BookingStatus::Confirmed,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this booking still claims its seats
    #[must_use]
    pub fn holds_seats(&self) -> bool {
        self.booking_status == BookingStatus::Confirmed
            && self.payment_status != PaymentStatus::Cancelled
    }

    /// The seat coordinates of this booking
    pub fn seat_coords(&self) -> impl Iterator<Item = SeatCoord> + '_ {
        self.seats.iter().map(BookedSeat::coord)
    }
}

/// Rejects empty seat sets and repeated coordinates.
///
/// # Errors
///
/// [`ValidationError::EmptySeatSet`] or [`ValidationError::DuplicateSeat`].
pub fn validate_distinct<I>(seats: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = SeatCoord>,
{
    let mut seen = HashSet::new();
    for seat in seats {
        if !seen.insert(seat) {
            return Err(ValidationError::DuplicateSeat(seat));
        }
    }
    if seen.is_empty() {
        return Err(ValidationError::EmptySeatSet);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key() -> ScreeningKey {
        ScreeningKey {
            movie_id: MovieId::new(),
            screen_id: ScreenId::new(),
            show_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            show_time: ShowTime::new("7:00 PM"),
        }
    }

    #[test]
    fn seat_labels_use_row_letters_and_one_based_columns() {
        assert_eq!(SeatCoord::new(0, 0).label(), "A1");
        assert_eq!(SeatCoord::new(2, 6).label(), "C7");
        assert_eq!(SeatCoord::new(25, 9).label(), "Z10");
        assert_eq!(SeatCoord::new(26, 0).label(), "AA1");
        assert_eq!(SeatCoord::new(4, 3).key(), "4-3");
    }

    proptest::proptest! {
        #[test]
        fn distinct_rows_get_distinct_labels(a in 0u32..5_000, b in 0u32..5_000, col in 0u32..50) {
            proptest::prop_assume!(a != b);
            proptest::prop_assert_ne!(SeatCoord::new(a, col).label(), SeatCoord::new(b, col).label());
        }

        #[test]
        fn labels_never_overflow(row in proptest::num::u32::ANY, col in proptest::num::u32::ANY) {
            let label = SeatCoord::new(row, col).label();
            proptest::prop_assert!(label.starts_with(|c: char| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn booking_total_is_sum_of_seat_prices() {
        let seats = vec![
            BookedSeat::new(SeatCoord::new(0, 0), Money::from_cents(35_000)),
            BookedSeat::new(SeatCoord::new(0, 1), Money::from_cents(20_000)),
        ];
        let booking = Booking::create(None, key(), seats, PaymentStatus::Pending, Utc::now()).unwrap();

        assert_eq!(booking.total_amount, Money::from_cents(55_000));
        assert_eq!(booking.booking_status, BookingStatus::Confirmed);
        assert!(booking.holds_seats());
    }

    #[test]
    fn booking_rejects_empty_and_duplicate_seats() {
        let err = Booking::create(None, key(), vec![], PaymentStatus::Pending, Utc::now());
        assert_eq!(err, Err(ValidationError::EmptySeatSet));

        let seat = BookedSeat::new(SeatCoord::new(1, 1), Money::from_cents(100));
        let err = Booking::create(
            None,
            key(),
            vec![seat.clone(), seat],
            PaymentStatus::Pending,
            Utc::now(),
        );
        assert_eq!(err, Err(ValidationError::DuplicateSeat(SeatCoord::new(1, 1))));
    }

    #[test]
    fn payment_status_terminal_states_have_no_exits() {
        use PaymentStatus::{Cancelled, Paid, Pending};
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        for terminal in [Paid, Cancelled] {
            for next in [Pending, Paid, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn screen_capacity_and_zones() {
        let screen = Screen::new(
            "Silver",
            5,
            10,
            vec![SeatType {
                name: "Executive".into(),
                price: Money::from_cents(35_000),
                zone: Some(SeatZone::rows(0, 1)),
            }],
        );
        assert!(screen.validate().is_ok());
        assert!(screen.contains(SeatCoord::new(4, 9)));
        assert!(!screen.contains(SeatCoord::new(5, 0)));
        assert_eq!(
            screen.seat_type_for(SeatCoord::new(1, 3)).map(|t| t.name.as_str()),
            Some("Executive")
        );
        assert!(screen.seat_type_for(SeatCoord::new(2, 3)).is_none());

        let broken = Screen { total_seats: 49, ..screen };
        assert!(matches!(
            broken.validate(),
            Err(ValidationError::InconsistentCapacity { declared: 49, .. })
        ));
    }

    #[test]
    fn unassigned_or_coming_soon_screenings_do_not_occupy_slots() {
        let now = Utc::now();
        let mut screening = Screening {
            id: ScreeningId::new(),
            movie_id: MovieId::new(),
            screen_id: Some(ScreenId::new()),
            show_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            show_times: [ShowTime::new("7:00 PM")].into_iter().collect(),
            status: ShowingStatus::NowShowing,
            created_at: now,
            updated_at: now,
        };
        assert!(screening.occupies_slots());
        assert!(screening.key_for(&ShowTime::new("7:00 PM")).is_some());
        assert!(screening.key_for(&ShowTime::new("9:00 PM")).is_none());

        screening.status = ShowingStatus::ComingSoon;
        assert!(!screening.occupies_slots());

        screening.status = ShowingStatus::NowShowing;
        screening.screen_id = None;
        assert!(!screening.occupies_slots());
    }
}
