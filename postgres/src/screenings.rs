//! `PostgreSQL` screening store.

use crate::codec::{db_error, decode_error, parse_status};
use async_trait::async_trait;
use chrono::NaiveDate;
use showtime_core::store::ScreeningStore;
use showtime_core::{
    MovieId, ScreenId, Screening, ScreeningId, ShowTime, ShowingStatus, StoreError,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

const SCREENING_COLUMNS: &str =
    "id, movie_id, screen_id, show_date, show_times, status, created_at, updated_at";

/// `PostgreSQL`-backed [`ScreeningStore`]. Show times are kept as a `TEXT[]`.
#[derive(Clone)]
pub struct PostgresScreeningStore {
    pool: PgPool,
}

impl PostgresScreeningStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScreeningStore for PostgresScreeningStore {
    async fn get(&self, id: ScreeningId) -> Result<Option<Screening>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SCREENING_COLUMNS} FROM screenings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(screening_from_row).transpose()
    }

    async fn on_screen(
        &self,
        screen_id: ScreenId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCREENING_COLUMNS} FROM screenings \
             WHERE screen_id = $1 AND show_date = $2 ORDER BY created_at, id"
        ))
        .bind(screen_id.as_uuid())
        .bind(show_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(screening_from_row).collect()
    }

    async fn for_movie(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
    ) -> Result<Vec<Screening>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCREENING_COLUMNS} FROM screenings \
             WHERE movie_id = $1 AND show_date = $2 ORDER BY created_at, id"
        ))
        .bind(movie_id.as_uuid())
        .bind(show_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(screening_from_row).collect()
    }

    async fn list(&self, show_date: Option<NaiveDate>) -> Result<Vec<Screening>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCREENING_COLUMNS} FROM screenings \
             WHERE ($1::DATE IS NULL OR show_date = $1) ORDER BY show_date, created_at, id"
        ))
        .bind(show_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(screening_from_row).collect()
    }

    #[tracing::instrument(skip(self, screening), fields(screening_id = %screening.id))]
    async fn save(&self, screening: &Screening) -> Result<(), StoreError> {
        let show_times: Vec<String> = screening
            .show_times
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();

        sqlx::query(
            r"
            INSERT INTO screenings (
                id, movie_id, screen_id, show_date, show_times, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                movie_id = EXCLUDED.movie_id,
                screen_id = EXCLUDED.screen_id,
                show_date = EXCLUDED.show_date,
                show_times = EXCLUDED.show_times,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(screening.id.as_uuid())
        .bind(screening.movie_id.as_uuid())
        .bind(screening.screen_id.map(|s| *s.as_uuid()))
        .bind(screening.show_date)
        .bind(&show_times)
        .bind(screening.status.as_str())
        .bind(screening.created_at)
        .bind(screening.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::debug!("Screening saved");
        Ok(())
    }
}

fn screening_from_row(row: &PgRow) -> Result<Screening, StoreError> {
    let show_times: Vec<String> = row.try_get("show_times").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;

    Ok(Screening {
        id: ScreeningId::from_uuid(row.try_get("id").map_err(decode_error)?),
        movie_id: MovieId::from_uuid(row.try_get("movie_id").map_err(decode_error)?),
        screen_id: row
            .try_get::<Option<Uuid>, _>("screen_id")
            .map_err(decode_error)?
            .map(ScreenId::from_uuid),
        show_date: row.try_get("show_date").map_err(decode_error)?,
        show_times: show_times.into_iter().map(ShowTime::new).collect(),
        status: parse_status::<ShowingStatus>(&status)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}
