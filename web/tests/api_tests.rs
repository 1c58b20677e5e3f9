//! HTTP API tests over in-memory stores.
//!
//! Each test builds a [`Cinema`] (Silver and Platinum screens, one movie), an
//! engine over it with a simulated gateway whose payments start pending, and a
//! `TestServer` around the real router.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use showtime_core::UserId;
use showtime_engine::{EngineConfig, EngineEnvironment, ShowtimeEngine, SimulatedPaymentGateway};
use showtime_testing::{show_date, Cinema};
use showtime_web::{build_router, AppState, CORRELATION_ID_HEADER, USER_ID_HEADER};
use std::sync::Arc;

struct Harness {
    server: TestServer,
    cinema: Cinema,
    gateway: SimulatedPaymentGateway,
}

async fn harness() -> Harness {
    let cinema = Cinema::new();
    cinema
        .schedule(&cinema.silver, show_date(), &["7:00 PM", "9:30 PM"])
        .await;

    let gateway = SimulatedPaymentGateway::default();
    let env = EngineEnvironment::new(
        Arc::new(cinema.clock.clone()),
        Arc::new(cinema.bookings.clone()),
        Arc::new(cinema.screenings.clone()),
        Arc::new(cinema.catalog.clone()),
        gateway.clone().shared(),
    );
    let engine = ShowtimeEngine::new(env, EngineConfig::default());
    let server = TestServer::new(build_router(AppState::in_memory(engine)))
        .expect("router should build a test server");

    Harness {
        server,
        cinema,
        gateway,
    }
}

fn user_header(user: UserId) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_bytes(USER_ID_HEADER.as_bytes()).unwrap(),
        HeaderValue::from_str(&user.to_string()).unwrap(),
    )
}

impl Harness {
    fn booking_body(&self, seats: Value) -> Value {
        json!({
            "movie": self.cinema.movie.id,
            "screen": self.cinema.silver.id,
            "showDate": show_date(),
            "showTime": "7:00 PM",
            "seats": seats,
        })
    }

    async fn book(&self, user: Option<UserId>, seats: Value) -> TestResponse {
        let request = self.server.post("/api/bookings").json(&self.booking_body(seats));
        match user {
            Some(user) => {
                let (name, value) = user_header(user);
                request.add_header(name, value).await
            }
            None => request.await,
        }
    }

    async fn occupied(&self) -> Value {
        self.server
            .get("/api/bookings/occupied-seats")
            .add_query_param("movie", self.cinema.movie.id)
            .add_query_param("showDate", show_date())
            .add_query_param("showTime", "7:00 PM")
            .await
            .json::<Value>()
    }

    async fn verify(&self, reference: &str) -> TestResponse {
        self.server
            .post("/api/payments/verify")
            .json(&json!({ "paymentIntentId": reference }))
            .await
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let h = harness().await;

    let health = h.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = h.server.get("/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["ready"], true);
}

#[tokio::test]
async fn test_create_booking_holds_seats() {
    let h = harness().await;

    let response = h
        .book(
            None,
            json!([{"row": 0, "col": 0, "price": 20000}, {"row": 9, "col": 1}]),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let booking = response.json::<Value>();
    assert_eq!(booking["paymentStatus"], "Pending");
    assert_eq!(booking["bookingStatus"], "Confirmed");
    // Standard 200.00 + Executive 350.00
    assert_eq!(booking["totalAmount"], 55_000);
    assert_eq!(booking["seats"][1]["seatNumber"], "J2");

    let occupied = h.occupied().await;
    assert_eq!(occupied["occupiedSeats"], json!(["0-0", "9-1"]));
    assert_eq!(occupied["seatNumbers"], json!(["A1", "J2"]));
}

#[tokio::test]
async fn test_responses_carry_correlation_id() {
    let h = harness().await;

    let response = h.book(None, json!([{"row": 0, "col": 0}])).await;
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
}

#[tokio::test]
async fn test_overlapping_booking_is_a_conflict() {
    let h = harness().await;

    h.book(None, json!([{"row": 0, "col": 0}, {"row": 0, "col": 1}]))
        .await;
    let response = h
        .book(None, json!([{"row": 0, "col": 1}, {"row": 0, "col": 2}]))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "SEAT_CONFLICT");
    assert_eq!(body["seats"], json!(["0-1"]));

    let occupied = h.occupied().await;
    assert_eq!(occupied["occupiedSeats"], json!(["0-0", "0-1"]));
}

#[tokio::test]
async fn test_invalid_selections_are_rejected() {
    let h = harness().await;

    let out_of_bounds = h.book(None, json!([{"row": 10, "col": 0}])).await;
    assert_eq!(out_of_bounds.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(out_of_bounds.json::<Value>()["code"], "VALIDATION_ERROR");

    let empty = h.book(None, json!([])).await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);

    let wrong_price = h.book(None, json!([{"row": 0, "col": 0, "price": 35000}])).await;
    assert_eq!(wrong_price.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(h.occupied().await["occupiedSeats"], json!([]));
}

#[tokio::test]
async fn test_unscheduled_show_is_not_bookable() {
    let h = harness().await;

    let response = h
        .server
        .post("/api/bookings")
        .json(&json!({
            "movie": h.cinema.movie.id,
            "screen": h.cinema.platinum.id,
            "showDate": show_date(),
            "showTime": "7:00 PM",
            "seats": [{"row": 0, "col": 0}],
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pay_for_pending_booking() {
    let h = harness().await;
    let user = UserId::new();

    let booking = h.book(Some(user), json!([{"row": 3, "col": 4}])).await.json::<Value>();
    let (name, value) = user_header(user);
    let intent = h
        .server
        .post("/api/payments/create-payment-intent")
        .add_header(name, value)
        .json(&json!({ "bookingId": booking["id"] }))
        .await;
    assert_eq!(intent.status_code(), StatusCode::OK);
    let intent = intent.json::<Value>();
    assert_eq!(intent["amount"], 20_000);
    assert_eq!(intent["currency"], "lkr");
    assert_eq!(intent["bookingId"], booking["id"]);
    let reference = intent["paymentReference"].as_str().unwrap().to_string();

    let early = h.verify(&reference).await;
    assert_eq!(early.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(early.json::<Value>()["code"], "PAYMENT_NOT_COMPLETED");

    assert!(h.gateway.complete(&reference));
    let paid = h.verify(&reference).await;
    assert_eq!(paid.status_code(), StatusCode::OK);
    let paid = paid.json::<Value>();
    assert_eq!(paid["id"], booking["id"]);
    assert_eq!(paid["paymentStatus"], "Paid");
    assert_eq!(paid["paymentReference"], reference.as_str());

    let replay = h.verify(&reference).await.json::<Value>();
    assert_eq!(replay["id"], booking["id"]);
    assert_eq!(replay["updatedAt"], paid["updatedAt"]);
}

#[tokio::test]
async fn test_second_payment_intent_for_booking_is_refused() {
    let h = harness().await;

    let booking = h.book(None, json!([{"row": 1, "col": 1}])).await.json::<Value>();
    let body = json!({ "bookingId": booking["id"] });

    let first = h
        .server
        .post("/api/payments/create-payment-intent")
        .json(&body)
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = h
        .server
        .post("/api/payments/create-payment-intent")
        .json(&body)
        .await;
    assert_eq!(second.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(h.gateway.intent_count(), 1);
}

#[tokio::test]
async fn test_guest_checkout_creates_paid_booking() {
    let h = harness().await;

    let intent = h
        .server
        .post("/api/payments/create-payment-intent")
        .json(&json!({
            "bookingData": h.booking_body(json!([{"row": 8, "col": 0}, {"row": 8, "col": 1}])),
        }))
        .await;
    assert_eq!(intent.status_code(), StatusCode::OK);
    let intent = intent.json::<Value>();
    assert_eq!(intent["bookingId"], Value::Null);
    assert_eq!(intent["amount"], 70_000);

    // Nothing is held until the payment lands.
    assert_eq!(h.occupied().await["occupiedSeats"], json!([]));

    let reference = intent["paymentReference"].as_str().unwrap().to_string();
    h.gateway.complete(&reference);

    let booking = h.verify(&reference).await;
    assert_eq!(booking.status_code(), StatusCode::OK);
    let booking = booking.json::<Value>();
    assert_eq!(booking["paymentStatus"], "Paid");
    assert_eq!(booking["userId"], Value::Null);
    assert_eq!(booking["totalAmount"], 70_000);

    let replay = h.verify(&reference).await.json::<Value>();
    assert_eq!(replay["id"], booking["id"]);
    assert_eq!(h.occupied().await["occupiedSeats"], json!(["8-0", "8-1"]));
}

#[tokio::test]
async fn test_payment_intent_needs_a_booking() {
    let h = harness().await;

    let response = h
        .server
        .post("/api/payments/create-payment-intent")
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_rejects_missing_and_unknown_references() {
    let h = harness().await;

    let missing = h.server.post("/api/payments/verify").json(&json!({})).await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

    let unknown = h.verify("pi_does_not_exist").await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_bookings_requires_identity() {
    let h = harness().await;
    let user = UserId::new();

    h.book(Some(user), json!([{"row": 0, "col": 0}])).await;
    h.book(Some(UserId::new()), json!([{"row": 0, "col": 1}])).await;

    let anonymous = h.server.get("/api/bookings/mine").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let (name, value) = user_header(user);
    let mine = h
        .server
        .get("/api/bookings/mine")
        .add_header(name, value)
        .await
        .json::<Vec<Value>>();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["userId"], json!(user));
}

#[tokio::test]
async fn test_bookings_are_private_to_their_owner() {
    let h = harness().await;
    let owner = UserId::new();

    let booking = h.book(Some(owner), json!([{"row": 2, "col": 2}])).await.json::<Value>();
    let path = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    let (name, value) = user_header(UserId::new());
    let stranger = h.server.get(&path).add_header(name, value).await;
    assert_eq!(stranger.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = user_header(owner);
    let own = h.server.get(&path).add_header(name, value).await;
    assert_eq!(own.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_guest_booking_is_hidden_from_signed_in_users() {
    let h = harness().await;

    let booking = h.book(None, json!([{"row": 6, "col": 0}])).await.json::<Value>();
    let path = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    let (name, value) = user_header(UserId::new());
    let read = h.server.get(&path).add_header(name, value).await;
    assert_eq!(read.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = user_header(UserId::new());
    let cancel = h
        .server
        .post(&format!("{path}/cancel"))
        .add_header(name, value)
        .await;
    assert_eq!(cancel.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(h.occupied().await["occupiedSeats"], json!(["6-0"]));

    let anonymous = h.server.get(&path).await;
    assert_eq!(anonymous.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_all_bookings() {
    let h = harness().await;

    h.book(Some(UserId::new()), json!([{"row": 4, "col": 4}])).await;
    h.cinema.clock.advance(chrono::Duration::minutes(1));
    let guest = h.book(None, json!([{"row": 4, "col": 5}])).await.json::<Value>();

    let response = h.server.get("/api/bookings").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let listed = response.json::<Vec<Value>>();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], guest["id"]);
    assert_eq!(listed[0]["userId"], Value::Null);
}

#[tokio::test]
async fn test_malformed_user_header_is_rejected() {
    let h = harness().await;

    let response = h
        .server
        .post("/api/bookings")
        .add_header(
            HeaderName::from_bytes(USER_ID_HEADER.as_bytes()).unwrap(),
            HeaderValue::from_static("alice"),
        )
        .json(&h.booking_body(json!([{"row": 0, "col": 0}])))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_cancel_releases_seats() {
    let h = harness().await;

    let booking = h.book(None, json!([{"row": 5, "col": 5}])).await.json::<Value>();
    let path = format!("/api/bookings/{}/cancel", booking["id"].as_str().unwrap());

    let cancelled = h.server.post(&path).await;
    assert_eq!(cancelled.status_code(), StatusCode::OK);
    let cancelled = cancelled.json::<Value>();
    assert_eq!(cancelled["paymentStatus"], "Cancelled");
    assert_eq!(cancelled["bookingStatus"], "Cancelled");
    assert_eq!(h.occupied().await["occupiedSeats"], json!([]));

    let again = h.server.post(&path).await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);

    let rebook = h.book(None, json!([{"row": 5, "col": 5}])).await;
    assert_eq!(rebook.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_schedule_conflicts_on_create_and_check() {
    let h = harness().await;
    let screen = h.cinema.platinum.id;

    let created = h
        .server
        .post("/api/screenings")
        .json(&json!({
            "movie": h.cinema.movie.id,
            "screen": screen,
            "showDate": show_date(),
            "showTimes": ["7:00 PM", "9:30 PM"],
        }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let created = created.json::<Value>();
    assert_eq!(created["status"], "Now Showing");

    let conflict = h
        .server
        .post("/api/screenings/check")
        .json(&json!({
            "screen": screen,
            "showDate": show_date(),
            "showTimes": ["9:30 PM", "11:00 PM"],
        }))
        .await;
    assert_eq!(conflict.status_code(), StatusCode::BAD_REQUEST);
    let conflict = conflict.json::<Value>();
    assert_eq!(conflict["code"], "SCHEDULE_CONFLICT");
    assert!(conflict["message"].as_str().unwrap().contains("9:30 PM"));

    let free = h
        .server
        .post("/api/screenings/check")
        .json(&json!({
            "screen": screen,
            "showDate": show_date(),
            "showTimes": ["11:00 PM"],
        }))
        .await;
    assert_eq!(free.status_code(), StatusCode::OK);

    // Editing a screening does not conflict with itself.
    let own = h
        .server
        .post("/api/screenings/check")
        .json(&json!({
            "screen": screen,
            "showDate": show_date(),
            "showTimes": ["9:30 PM"],
            "screeningId": created["id"],
        }))
        .await;
    assert_eq!(own.status_code(), StatusCode::OK);

    let duplicate = h
        .server
        .post("/api/screenings")
        .json(&json!({
            "movie": h.cinema.movie.id,
            "screen": screen,
            "showDate": show_date(),
            "showTimes": ["9:30 PM"],
        }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_list_screenings() {
    let h = harness().await;

    let listed = h
        .server
        .get("/api/screenings")
        .add_query_param("date", show_date())
        .await
        .json::<Vec<Value>>();
    assert_eq!(listed.len(), 1);
    let id = listed[0]["id"].as_str().unwrap().to_string();

    let updated = h
        .server
        .put(&format!("/api/screenings/{id}"))
        .json(&json!({ "showTimes": ["6:00 PM"] }))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    assert_eq!(updated.json::<Value>()["showTimes"], json!(["6:00 PM"]));

    let fetched = h.server.get(&format!("/api/screenings/{id}")).await;
    assert_eq!(fetched.json::<Value>()["showTimes"], json!(["6:00 PM"]));

    let other_day = h
        .server
        .get("/api/screenings")
        .add_query_param("date", "2030-01-01")
        .await
        .json::<Vec<Value>>();
    assert!(other_day.is_empty());
}
