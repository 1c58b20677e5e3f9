//! Error types for web handlers.
//!
//! [`AppError`] bridges engine errors and HTTP responses. Every engine error
//! maps onto one status code and a stable `code` string clients can switch on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use showtime_core::{EngineError, SeatCoord};
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Booking>, AppError> {
///     let booking = state.engine.booking(id, payer).await?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Seats the client must deselect, for seat conflicts
    seats: Vec<String>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            seats: Vec::new(),
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Validation(_) => {
                Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
            }
            EngineError::ScheduleConflict { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "SCHEDULE_CONFLICT")
            }
            EngineError::PaymentNotCompleted { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "PAYMENT_NOT_COMPLETED")
            }
            EngineError::InvalidTransition { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "INVALID_TRANSITION")
            }
            EngineError::SeatConflict { seats } => Self {
                seats: seats.iter().map(SeatCoord::key).collect(),
                ..Self::new(StatusCode::BAD_REQUEST, message, "SEAT_CONFLICT")
            },
            EngineError::NotFound { .. } | EngineError::PaymentReferenceNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
            }
            EngineError::Busy { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "BUSY")
            }
            EngineError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN"),
            EngineError::Storage(_) | EngineError::Payment(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
    /// Seats to deselect, as `row-col` keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    seats: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() && self.status != StatusCode::SERVICE_UNAVAILABLE {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(status = %self.status, code = self.code, message = %self.message, "Internal server error");
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            seats: self.seats,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}
