//! Router configuration.

use crate::handlers::{bookings, health, payments, screenings};
use crate::middleware::request_tracking_layer;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// API routes live under `/api` and are tracked (correlation ID, metrics);
/// `/health` and `/ready` are not.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Bookings
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/bookings/occupied-seats", get(bookings::occupied_seats))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        // Payments
        .route(
            "/payments/create-payment-intent",
            post(payments::create_payment_intent),
        )
        .route("/payments/verify", post(payments::verify_payment))
        // Screenings
        .route(
            "/screenings",
            get(screenings::list_screenings).post(screenings::create_screening),
        )
        .route("/screenings/check", post(screenings::check_schedule))
        .route(
            "/screenings/:id",
            get(screenings::get_screening).put(screenings::update_screening),
        )
        .route_layer(request_tracking_layer());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
