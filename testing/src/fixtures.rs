//! Box office fixtures: the two house screens, a movie, and helpers to schedule
//! screenings and build bookings without going through the engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use crate::mocks::{test_clock, ManualClock};
use crate::stores::{InMemoryBookingStore, InMemoryCatalog, InMemoryScreeningStore};
use chrono::{DateTime, NaiveDate, Utc};
use showtime_core::environment::Clock;
use showtime_core::{
    BookedSeat, Booking, Money, Movie, MovieId, PaymentStatus, Screen, ScreenId, Screening,
    ScreeningId, ScreeningKey, SeatCoord, SeatType, SeatZone, ShowTime, ShowingStatus,
};

/// Price of seats outside every seat-type zone (1300.00)
pub const FLAT_RATE: Money = Money::from_cents(130_000);

/// The calendar day most tests book against
#[must_use]
pub fn show_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Silver: 10x10, Standard 200.00 in rows A-H, Executive 350.00 in rows I-J
#[must_use]
pub fn silver_screen() -> Screen {
    Screen::new(
        "Silver",
        10,
        10,
        vec![
            SeatType {
                name: "Standard".into(),
                price: Money::from_cents(20_000),
                zone: Some(SeatZone::rows(0, 7)),
            },
            SeatType {
                name: "Executive".into(),
                price: Money::from_cents(35_000),
                zone: Some(SeatZone::rows(8, 9)),
            },
        ],
    )
}

/// Platinum: 5x10, Premium 500.00 in rows A-C, VIP 800.00 in rows D-E
#[must_use]
pub fn platinum_screen() -> Screen {
    Screen::new(
        "Platinum",
        5,
        10,
        vec![
            SeatType {
                name: "Premium".into(),
                price: Money::from_cents(50_000),
                zone: Some(SeatZone::rows(0, 2)),
            },
            SeatType {
                name: "VIP".into(),
                price: Money::from_cents(80_000),
                zone: Some(SeatZone::rows(3, 4)),
            },
        ],
    )
}

/// A screening key with fresh ids for the test date at 7:00 PM
#[must_use]
pub fn screening_key() -> ScreeningKey {
    ScreeningKey {
        movie_id: MovieId::new(),
        screen_id: ScreenId::new(),
        show_date: show_date(),
        show_time: ShowTime::new("7:00 PM"),
    }
}

/// A pending booking at the flat rate for `seats` given as `(row, col)`
#[must_use]
pub fn booking_at(key: &ScreeningKey, seats: &[(u32, u32)], now: DateTime<Utc>) -> Booking {
    let seats = seats
        .iter()
        .map(|&(row, col)| BookedSeat::new(SeatCoord::new(row, col), FLAT_RATE))
        .collect();
    Booking::create(None, key.clone(), seats, PaymentStatus::Pending, now).unwrap()
}

/// In-memory cinema: catalog with both house screens and one movie, empty
/// schedule and bookings, and a manual clock.
///
/// The stores share state with their clones, so hand `Arc::new(cinema.bookings.clone())`
/// to the code under test and inspect `cinema.bookings` afterwards.
#[derive(Clone, Debug)]
pub struct Cinema {
    /// Screens and movies
    pub catalog: InMemoryCatalog,
    /// Screenings
    pub screenings: InMemoryScreeningStore,
    /// Bookings
    pub bookings: InMemoryBookingStore,
    /// Clock, starting at [`test_clock`]
    pub clock: ManualClock,
    /// The Silver screen
    pub silver: Screen,
    /// The Platinum screen
    pub platinum: Screen,
    /// A movie that is now showing
    pub movie: Movie,
}

impl Default for Cinema {
    fn default() -> Self {
        Self::new()
    }
}

impl Cinema {
    /// Build the cinema
    #[must_use]
    pub fn new() -> Self {
        let catalog = InMemoryCatalog::new();
        let silver = silver_screen();
        let platinum = platinum_screen();
        let movie = Movie::new("Interstellar", 169);
        catalog.add_screen(silver.clone());
        catalog.add_screen(platinum.clone());
        catalog.add_movie(movie.clone());

        Self {
            catalog,
            screenings: InMemoryScreeningStore::new(),
            bookings: InMemoryBookingStore::new(),
            clock: ManualClock::new(test_clock().now()),
            silver,
            platinum,
            movie,
        }
    }

    /// Store a now-showing screening of the movie directly, skipping conflict checks
    pub async fn schedule(&self, screen: &Screen, date: NaiveDate, times: &[&str]) -> Screening {
        use showtime_core::store::ScreeningStore;

        let now = self.clock.now();
        let screening = Screening {
            id: ScreeningId::new(),
            movie_id: self.movie.id,
            screen_id: Some(screen.id),
            show_date: date,
            show_times: times.iter().map(|t| ShowTime::new(*t)).collect(),
            status: ShowingStatus::NowShowing,
            created_at: now,
            updated_at: now,
        };
        self.screenings.save(&screening).await.unwrap();
        screening
    }

    /// Key for the movie on `screen` at `time` on [`show_date`]
    #[must_use]
    pub fn key(&self, screen: &Screen, time: &str) -> ScreeningKey {
        ScreeningKey {
            movie_id: self.movie.id,
            screen_id: screen.id,
            show_date: show_date(),
            show_time: ShowTime::new(time),
        }
    }
}
