//! Screening scheduling through the engine: conflict checks on create, update
//! and the read-only pre-check.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

mod common;

use common::engine_over;
use showtime_core::{EngineError, MovieId, ShowTime, ShowingStatus};
use showtime_engine::{NewScreening, ScheduleProposal, ScreeningUpdate, SimulatedPaymentGateway};
use showtime_testing::{show_date, Cinema};
use std::collections::BTreeSet;
use std::sync::Arc;

fn times(labels: &[&str]) -> BTreeSet<ShowTime> {
    labels.iter().map(|l| ShowTime::new(*l)).collect()
}

fn new_screening(cinema: &Cinema, labels: &[&str]) -> NewScreening {
    NewScreening {
        movie_id: cinema.movie.id,
        screen_id: Some(cinema.silver.id),
        show_date: show_date(),
        show_times: times(labels),
        status: ShowingStatus::NowShowing,
    }
}

/// Silver on the same day: 7:00/9:30 PM taken, so 9:30/11:00 PM is refused and
/// 11:00 PM alone is accepted.
#[tokio::test]
async fn test_overlapping_show_times_are_rejected() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    engine
        .create_screening(new_screening(&cinema, &["7:00 PM", "9:30 PM"]))
        .await
        .unwrap();

    let err = engine
        .create_screening(new_screening(&cinema, &["9:30 PM", "11:00 PM"]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::ScheduleConflict {
            screen_name: "Silver".to_string(),
            conflicting_times: vec![ShowTime::new("9:30 PM")],
        }
    );
    assert_eq!(
        err.to_string(),
        "Conflict! Show at 9:30 PM is already booked on Silver for this date."
    );
    assert_eq!(cinema.screenings.len(), 1, "Rejected screening must not be stored");

    engine
        .create_screening(new_screening(&cinema, &["11:00 PM"]))
        .await
        .unwrap();
    assert_eq!(cinema.screenings.len(), 2);
}

/// Updating a screening does not conflict with itself, but does with others.
#[tokio::test]
async fn test_update_rechecks_against_other_screenings() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    let evening = engine
        .create_screening(new_screening(&cinema, &["7:00 PM"]))
        .await
        .unwrap();
    let late = engine
        .create_screening(new_screening(&cinema, &["11:00 PM"]))
        .await
        .unwrap();

    let updated = engine
        .update_screening(
            evening.id,
            ScreeningUpdate {
                show_times: Some(times(&["7:00 PM", "9:00 PM"])),
                ..ScreeningUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.show_times, times(&["7:00 PM", "9:00 PM"]));
    assert_eq!(updated.screen_id, Some(cinema.silver.id));

    let err = engine
        .update_screening(
            late.id,
            ScreeningUpdate {
                show_times: Some(times(&["9:00 PM", "11:00 PM"])),
                ..ScreeningUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScheduleConflict { .. }));
    assert_eq!(
        engine.screening(late.id).await.unwrap().show_times,
        times(&["11:00 PM"])
    );

    // Moving it to the other screen clears the conflict.
    engine
        .update_screening(
            late.id,
            ScreeningUpdate {
                screen_id: Some(cinema.platinum.id),
                show_times: Some(times(&["9:00 PM", "11:00 PM"])),
                ..ScreeningUpdate::default()
            },
        )
        .await
        .unwrap();
}

/// Coming-soon and unassigned screenings never conflict.
#[tokio::test]
async fn test_exempt_screenings_do_not_conflict() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    engine
        .create_screening(new_screening(&cinema, &["7:00 PM"]))
        .await
        .unwrap();

    let mut coming_soon = new_screening(&cinema, &["7:00 PM"]);
    coming_soon.status = ShowingStatus::ComingSoon;
    let parked = engine.create_screening(coming_soon).await.unwrap();

    let mut unassigned = new_screening(&cinema, &["7:00 PM"]);
    unassigned.screen_id = None;
    engine.create_screening(unassigned).await.unwrap();

    // Activating the parked screening brings it into the check.
    let err = engine
        .update_screening(
            parked.id,
            ScreeningUpdate {
                status: Some(ShowingStatus::NowShowing),
                ..ScreeningUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScheduleConflict { .. }));
}

#[tokio::test]
async fn test_check_is_read_only() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    let existing = engine
        .create_screening(new_screening(&cinema, &["7:00 PM"]))
        .await
        .unwrap();

    let proposal = ScheduleProposal {
        screening_id: None,
        screen_id: Some(cinema.silver.id),
        show_date: show_date(),
        show_times: times(&["7:00 PM", "10:00 PM"]),
        status: ShowingStatus::NowShowing,
    };
    let err = engine.check_schedule(&proposal).await.unwrap_err();
    assert!(matches!(err, EngineError::ScheduleConflict { ref conflicting_times, .. }
        if conflicting_times == &vec![ShowTime::new("7:00 PM")]));

    let own = ScheduleProposal {
        screening_id: Some(existing.id),
        ..proposal
    };
    engine.check_schedule(&own).await.unwrap();
    assert_eq!(cinema.screenings.len(), 1);
}

#[tokio::test]
async fn test_unknown_movie_or_screen_is_not_found() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());

    let mut unknown_movie = new_screening(&cinema, &["7:00 PM"]);
    unknown_movie.movie_id = MovieId::new();
    let err = engine.create_screening(unknown_movie).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { resource: "Movie", .. }));

    let mut unknown_screen = new_screening(&cinema, &["7:00 PM"]);
    unknown_screen.screen_id = Some(showtime_core::ScreenId::new());
    let err = engine.create_screening(unknown_screen).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { resource: "Screen", .. }));
}

/// Ten admins racing to claim the same slot: exactly one wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_for_one_slot() {
    let cinema = Cinema::new();
    let engine = Arc::new(engine_over(&cinema, &SimulatedPaymentGateway::default()));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let new = new_screening(&cinema, &["8:00 PM"]);
            tokio::spawn(async move { engine.create_screening(new).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(cinema.screenings.len(), 1);
}

#[tokio::test]
async fn test_list_filters_by_day() {
    let cinema = Cinema::new();
    let engine = engine_over(&cinema, &SimulatedPaymentGateway::default());
    engine
        .create_screening(new_screening(&cinema, &["7:00 PM"]))
        .await
        .unwrap();
    let mut tomorrow = new_screening(&cinema, &["7:00 PM"]);
    tomorrow.show_date = show_date().succ_opt().unwrap();
    engine.create_screening(tomorrow).await.unwrap();

    assert_eq!(engine.screenings(None).await.unwrap().len(), 2);
    assert_eq!(engine.screenings(Some(show_date())).await.unwrap().len(), 1);
}
