//! Reservation, pricing, occupancy and cancellation through the engine facade.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

mod common;

use common::{engine_over, request};
use showtime_core::store::ScreeningStore;
use showtime_core::{
    BookingStatus, EngineError, Money, MovieId, PaymentStatus, SeatCoord, ShowTime,
    ShowingStatus, UserId, ValidationError,
};
use showtime_engine::{ReservationRequest, SeatSelection, SimulatedPaymentGateway};
use showtime_testing::{show_date, Cinema};

/// Seats are priced by their zone and the booking total is their sum.
#[tokio::test]
async fn test_reserve_prices_seats_by_zone() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");
    let payer = UserId::new();

    let booking = engine
        .reserve(ReservationRequest {
            screening: key.clone(),
            seats: vec![
                SeatSelection::quoted(8, 0, Money::from_cents(35_000)),
                SeatSelection::quoted(0, 1, Money::from_cents(20_000)),
            ],
            payer: Some(payer),
            quoted_total: Some(Money::from_cents(55_000)),
        })
        .await
        .unwrap();

    assert_eq!(booking.total_amount, Money::from_cents(55_000));
    assert_eq!(booking.payment_status, PaymentStatus::Pending);
    assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    assert_eq!(booking.user_id, Some(payer));
    let labels: Vec<_> = booking.seats.iter().map(|s| s.seat_number.as_str()).collect();
    assert_eq!(labels, vec!["I1", "A2"]);
}

/// A quoted total that disagrees with the screen's prices is rejected before
/// anything is stored.
#[tokio::test]
async fn test_reserve_rejects_wrong_total() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let mut request = request(&cinema.key(&cinema.silver, "7:00 PM"), &[(8, 0), (0, 1)]);
    request.quoted_total = Some(Money::from_cents(50_000));

    let err = engine.reserve(request).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::TotalMismatch { .. })
    ));
    assert!(cinema.bookings.is_empty());
}

/// Row 5 does not exist on a 5-row screen.
#[tokio::test]
async fn test_reserve_rejects_seat_outside_screen() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.platinum, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    let err = engine
        .reserve(request(&cinema.key(&cinema.platinum, "7:00 PM"), &[(5, 0)]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Validation(ValidationError::SeatOutOfBounds {
            seat: SeatCoord::new(5, 0),
            rows: 5,
            cols: 10,
        })
    );
    assert!(cinema.bookings.is_empty());
}

#[tokio::test]
async fn test_reserve_rejects_empty_and_duplicate_selections() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");

    let err = engine.reserve(request(&key, &[])).await.unwrap_err();
    assert_eq!(err, EngineError::Validation(ValidationError::EmptySeatSet));

    let err = engine
        .reserve(request(&key, &[(1, 1), (1, 1)]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::DuplicateSeat(SeatCoord::new(1, 1)))
    );
}

/// The second overlapping request is told exactly which seats it lost.
#[tokio::test]
async fn test_overlapping_reservation_reports_taken_seats() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");

    engine.reserve(request(&key, &[(0, 0), (0, 1)])).await.unwrap();
    let err = engine
        .reserve(request(&key, &[(0, 1), (0, 2)]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Seats already taken: A2");
    assert_eq!(cinema.bookings.len(), 1);
}

#[tokio::test]
async fn test_unscheduled_or_unsellable_screenings_are_rejected() {
    let cinema = Cinema::new();
    let screening = cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    let err = engine
        .reserve(request(&cinema.key(&cinema.silver, "9:30 PM"), &[(0, 0)]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::UnscheduledShowTime(ShowTime::new("9:30 PM")))
    );

    let err = engine
        .reserve(request(&cinema.key(&cinema.platinum, "7:00 PM"), &[(0, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { resource: "Screening", .. }));

    let mut unknown_movie = cinema.key(&cinema.silver, "7:00 PM");
    unknown_movie.movie_id = MovieId::new();
    let err = engine.reserve(request(&unknown_movie, &[(0, 0)])).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { resource: "Movie", .. }));

    let mut coming_soon = screening;
    coming_soon.status = ShowingStatus::ComingSoon;
    cinema.screenings.save(&coming_soon).await.unwrap();
    let err = engine
        .reserve(request(&cinema.key(&cinema.silver, "7:00 PM"), &[(0, 0)]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Validation(ValidationError::ScreeningNotBookable));
}

/// A storage failure during the insert leaves nothing behind.
#[tokio::test]
async fn test_storage_failure_leaves_no_booking() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");

    cinema.bookings.fail_next_insert();
    let err = engine.reserve(request(&key, &[(3, 3)])).await.unwrap_err();

    assert!(matches!(err, EngineError::Storage(_)));
    assert!(!err.is_retryable());
    assert!(cinema.bookings.is_empty());
    engine.reserve(request(&key, &[(3, 3)])).await.unwrap();
}

/// Occupancy covers pending bookings of the exact showing and nothing else.
#[tokio::test]
async fn test_occupancy_is_scoped_to_the_showing() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM", "9:30 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let evening = cinema.key(&cinema.silver, "7:00 PM");
    let late = cinema.key(&cinema.silver, "9:30 PM");

    let empty = engine
        .occupied_seats(evening.movie_id, evening.show_date, &evening.show_time)
        .await
        .unwrap();
    assert!(empty.is_empty());

    engine.reserve(request(&evening, &[(0, 0), (0, 1)])).await.unwrap();
    engine.reserve(request(&late, &[(4, 4)])).await.unwrap();

    let occupied = engine
        .occupied_seats(evening.movie_id, evening.show_date, &evening.show_time)
        .await
        .unwrap();
    assert_eq!(
        occupied.into_iter().collect::<Vec<_>>(),
        vec![SeatCoord::new(0, 0), SeatCoord::new(0, 1)]
    );
}

/// Cancelling releases seats; only the owner may cancel, and only once.
#[tokio::test]
async fn test_cancel_releases_seats_for_the_owner_only() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");
    let owner = UserId::new();

    let mut wanted = request(&key, &[(2, 2)]);
    wanted.payer = Some(owner);
    let booking = engine.reserve(wanted).await.unwrap();

    let err = engine.cancel(booking.id, Some(UserId::new())).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.cancel(booking.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let cancelled = engine.cancel(booking.id, Some(owner)).await.unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
    assert_eq!(cancelled.booking_status, BookingStatus::Cancelled);

    let err = engine.cancel(booking.id, Some(owner)).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidTransition {
            from: PaymentStatus::Cancelled,
            to: PaymentStatus::Cancelled,
        }
    );

    engine.reserve(request(&key, &[(2, 2)])).await.unwrap();
}

#[tokio::test]
async fn test_my_bookings_are_newest_first() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");
    let payer = UserId::new();

    let mut first = request(&key, &[(0, 0)]);
    first.payer = Some(payer);
    let first = engine.reserve(first).await.unwrap();

    cinema.clock.advance(chrono::Duration::minutes(1));
    let mut second = request(&key, &[(0, 1)]);
    second.payer = Some(payer);
    let second = engine.reserve(second).await.unwrap();

    engine.reserve(request(&key, &[(0, 2)])).await.unwrap();

    let mine: Vec<_> = engine
        .bookings_for(payer)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(mine, vec![second.id, first.id]);

    assert_eq!(engine.booking(first.id, Some(payer)).await.unwrap().id, first.id);
}

/// The admin listing shows every booking in any status, newest first.
#[tokio::test]
async fn test_all_bookings_lists_every_status() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let key = cinema.key(&cinema.silver, "7:00 PM");

    let mut owned = request(&key, &[(1, 0)]);
    owned.payer = Some(UserId::new());
    let owned = engine.reserve(owned).await.unwrap();

    cinema.clock.advance(chrono::Duration::minutes(1));
    let guest = engine.reserve(request(&key, &[(1, 1)])).await.unwrap();
    engine.cancel(guest.id, None).await.unwrap();

    let all = engine.all_bookings().await.unwrap();
    let listed: Vec<_> = all.iter().map(|b| (b.id, b.payment_status)).collect();
    assert_eq!(
        listed,
        vec![
            (guest.id, PaymentStatus::Cancelled),
            (owned.id, PaymentStatus::Pending),
        ]
    );
}

/// A guest booking is reachable by its id alone, but not from a signed-in
/// account that did not make it.
#[tokio::test]
async fn test_guest_booking_is_closed_to_signed_in_users() {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM"])
        .await;
    let gateway = SimulatedPaymentGateway::default();
    let engine = engine_over(&cinema, &gateway);
    let guest = engine
        .reserve(request(&cinema.key(&cinema.silver, "7:00 PM"), &[(4, 0)]))
        .await
        .unwrap();
    let stranger = Some(UserId::new());

    let err = engine.booking(guest.id, stranger).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.cancel(guest.id, stranger).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.initiate_checkout(guest.id, stranger).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(gateway.intent_count(), 0);

    let still_held = engine.booking(guest.id, None).await.unwrap();
    assert_eq!(still_held.payment_status, PaymentStatus::Pending);
}
