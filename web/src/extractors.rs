//! Custom Axum extractors.
//!
//! Authentication happens upstream; the gateway forwards the caller's identity
//! in the `X-User-Id` header. [`Payer`] reads it when present, [`SignedInUser`]
//! requires it.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use showtime_core::UserId;
use uuid::Uuid;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The caller's identity, if any. Guests have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payer(pub Option<UserId>);

#[async_trait]
impl<S> FromRequestParts<S> for Payer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from(&parts.headers).map(Self)
    }
}

/// The caller's identity, rejecting anonymous requests with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedInUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for SignedInUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from(&parts.headers)?
            .map(Self)
            .ok_or_else(|| AppError::unauthorized(format!("Missing {USER_ID_HEADER} header")))
    }
}

/// A malformed header is an error, not an anonymous caller.
fn user_id_from(headers: &HeaderMap) -> Result<Option<UserId>, AppError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(|uuid| Some(UserId::from_uuid(uuid)))
        .ok_or_else(|| AppError::bad_request(format!("Invalid {USER_ID_HEADER} header")))
}
