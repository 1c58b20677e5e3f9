//! Screening administration endpoints.
//!
//! - `POST /api/screenings/check` - Validate show times without saving
//! - `POST /api/screenings` - Schedule a screening
//! - `PUT /api/screenings/:id` - Partial update, re-checked for conflicts
//! - `GET /api/screenings/:id` - One screening
//! - `GET /api/screenings?date=YYYY-MM-DD` - List, optionally for one day

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use showtime_core::{MovieId, ScreenId, Screening, ScreeningId, ShowTime, ShowingStatus};
use showtime_engine::{NewScreening, ScheduleProposal, ScreeningUpdate};
use std::collections::BTreeSet;

/// Show times to validate on a screen and day.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckScheduleRequest {
    /// Screen; unassigned screenings never conflict
    #[serde(default)]
    pub screen: Option<ScreenId>,
    /// Calendar day
    pub show_date: NaiveDate,
    /// Candidate time labels
    #[serde(default)]
    pub show_times: BTreeSet<ShowTime>,
    /// Screening being edited, excluded from the comparison
    #[serde(default)]
    pub screening_id: Option<ScreeningId>,
    /// Status the screening will have
    #[serde(default)]
    pub status: ShowingStatus,
}

/// Result of a successful check.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckScheduleResponse {
    /// Always `true`; conflicts are reported as errors
    pub available: bool,
}

/// Fields for a new screening.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScreeningRequest {
    /// Movie
    pub movie: MovieId,
    /// Screen
    #[serde(default)]
    pub screen: Option<ScreenId>,
    /// Calendar day
    pub show_date: NaiveDate,
    /// Time labels
    #[serde(default)]
    pub show_times: BTreeSet<ShowTime>,
    /// Status (defaults to `Now Showing`)
    #[serde(default)]
    pub status: ShowingStatus,
}

/// Partial screening update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScreeningRequest {
    /// New screen
    #[serde(default)]
    pub screen: Option<ScreenId>,
    /// New day
    #[serde(default)]
    pub show_date: Option<NaiveDate>,
    /// New time labels
    #[serde(default)]
    pub show_times: Option<BTreeSet<ShowTime>>,
    /// New status
    #[serde(default)]
    pub status: Option<ShowingStatus>,
}

/// Optional day filter.
#[derive(Debug, Deserialize)]
pub struct ListScreeningsQuery {
    /// Calendar day
    pub date: Option<NaiveDate>,
}

/// Screening details.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResponse {
    /// Screening ID
    pub id: ScreeningId,
    /// Movie
    pub movie: MovieId,
    /// Screen
    pub screen: Option<ScreenId>,
    /// Calendar day
    pub show_date: NaiveDate,
    /// Time labels, sorted
    pub show_times: Vec<ShowTime>,
    /// Status
    pub status: ShowingStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<Screening> for ScreeningResponse {
    fn from(screening: Screening) -> Self {
        Self {
            id: screening.id,
            movie: screening.movie_id,
            screen: screening.screen_id,
            show_date: screening.show_date,
            show_times: screening.show_times.into_iter().collect(),
            status: screening.status,
            created_at: screening.created_at,
            updated_at: screening.updated_at,
        }
    }
}

/// Validate show times against the screen's other screenings that day.
///
/// # Errors
///
/// 400 with `SCHEDULE_CONFLICT` naming the taken times, 404 for an unknown screen.
pub async fn check_schedule(
    State(state): State<AppState>,
    Json(request): Json<CheckScheduleRequest>,
) -> Result<Json<CheckScheduleResponse>, AppError> {
    let proposal = ScheduleProposal {
        screening_id: request.screening_id,
        screen_id: request.screen,
        show_date: request.show_date,
        show_times: request.show_times,
        status: request.status,
    };
    state.engine.check_schedule(&proposal).await?;
    Ok(Json(CheckScheduleResponse { available: true }))
}

/// Schedule a screening.
///
/// # Errors
///
/// 400 on a conflict, 404 for an unknown movie or screen.
pub async fn create_screening(
    State(state): State<AppState>,
    Json(request): Json<CreateScreeningRequest>,
) -> Result<(StatusCode, Json<ScreeningResponse>), AppError> {
    let screening = state
        .engine
        .create_screening(NewScreening {
            movie_id: request.movie,
            screen_id: request.screen,
            show_date: request.show_date,
            show_times: request.show_times,
            status: request.status,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(screening.into())))
}

/// Update a screening.
///
/// # Errors
///
/// 400 on a conflict, 404 for an unknown screening or screen.
pub async fn update_screening(
    State(state): State<AppState>,
    Path(id): Path<ScreeningId>,
    Json(request): Json<UpdateScreeningRequest>,
) -> Result<Json<ScreeningResponse>, AppError> {
    let screening = state
        .engine
        .update_screening(
            id,
            ScreeningUpdate {
                screen_id: request.screen,
                show_date: request.show_date,
                show_times: request.show_times,
                status: request.status,
            },
        )
        .await?;

    Ok(Json(screening.into()))
}

/// One screening.
///
/// # Errors
///
/// 404 if absent.
pub async fn get_screening(
    State(state): State<AppState>,
    Path(id): Path<ScreeningId>,
) -> Result<Json<ScreeningResponse>, AppError> {
    Ok(Json(state.engine.screening(id).await?.into()))
}

/// List screenings.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_screenings(
    State(state): State<AppState>,
    Query(query): Query<ListScreeningsQuery>,
) -> Result<Json<Vec<ScreeningResponse>>, AppError> {
    let screenings = state.engine.screenings(query.date).await?;
    Ok(Json(
        screenings.into_iter().map(ScreeningResponse::from).collect(),
    ))
}
