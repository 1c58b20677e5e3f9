//! HTTP surface for the Showtime booking engine.
//!
//! Handlers are thin: they extract the caller (`X-User-Id`) and the JSON
//! payload, call one [`showtime_engine::ShowtimeEngine`] operation, and map the
//! result (or [`AppError`]) to a response.
//!
//! # Example
//!
//! ```ignore
//! use showtime_web::{build_router, AppState};
//!
//! let state = AppState::new(engine, pool);
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use extractors::{Payer, SignedInUser, USER_ID_HEADER};
pub use middleware::{register_http_metrics, request_tracking_layer, CORRELATION_ID_HEADER};
pub use routes::build_router;
pub use state::AppState;
