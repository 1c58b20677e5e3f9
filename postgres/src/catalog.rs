//! `PostgreSQL` catalog of screens and movies.
//!
//! The engine only reads from it; the write methods exist for seeding and
//! back-office tooling.

use crate::codec::{db_error, decode_error, from_int, parse_status, to_int};
use async_trait::async_trait;
use showtime_core::store::CatalogStore;
use showtime_core::{Movie, MovieId, Screen, ScreenId, SeatType, StoreError};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::Row;

/// `PostgreSQL`-backed [`CatalogStore`]. Seat types are stored as JSONB.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Create a catalog over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a screen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails (including a
    /// duplicate screen name or a capacity that disagrees with the grid).
    pub async fn save_screen(&self, screen: &Screen) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO screens (id, name, seat_rows, seat_cols, total_seats, seat_types)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                seat_rows = EXCLUDED.seat_rows,
                seat_cols = EXCLUDED.seat_cols,
                total_seats = EXCLUDED.total_seats,
                seat_types = EXCLUDED.seat_types
            ",
        )
        .bind(screen.id.as_uuid())
        .bind(&screen.name)
        .bind(to_int(screen.rows, "rows")?)
        .bind(to_int(screen.cols, "cols")?)
        .bind(to_int(screen.total_seats, "total_seats")?)
        .bind(Json(&screen.seat_types))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Insert or replace a movie.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub async fn save_movie(&self, movie: &Movie) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO movies (id, title, duration_minutes, status, release_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                duration_minutes = EXCLUDED.duration_minutes,
                status = EXCLUDED.status,
                release_date = EXCLUDED.release_date
            ",
        )
        .bind(movie.id.as_uuid())
        .bind(&movie.title)
        .bind(to_int(movie.duration_minutes, "duration_minutes")?)
        .bind(movie.status.as_str())
        .bind(movie.release_date)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Look up a screen by its display name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    pub async fn screen_by_name(&self, name: &str) -> Result<Option<Screen>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, seat_rows, seat_cols, total_seats, seat_types FROM screens WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(screen_from_row).transpose()
    }

    /// All screens ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    pub async fn screens(&self) -> Result<Vec<Screen>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, seat_rows, seat_cols, total_seats, seat_types FROM screens ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(screen_from_row).collect()
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn screen(&self, id: ScreenId) -> Result<Option<Screen>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, seat_rows, seat_cols, total_seats, seat_types FROM screens WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(screen_from_row).transpose()
    }

    async fn movie(&self, id: MovieId) -> Result<Option<Movie>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, duration_minutes, status, release_date FROM movies WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(movie_from_row).transpose()
    }
}

fn screen_from_row(row: &PgRow) -> Result<Screen, StoreError> {
    let Json(seat_types): Json<Vec<SeatType>> = row.try_get("seat_types").map_err(decode_error)?;

    Ok(Screen {
        id: ScreenId::from_uuid(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        rows: from_int(row.try_get("seat_rows").map_err(decode_error)?, "seat_rows")?,
        cols: from_int(row.try_get("seat_cols").map_err(decode_error)?, "seat_cols")?,
        total_seats: from_int(row.try_get("total_seats").map_err(decode_error)?, "total_seats")?,
        seat_types,
    })
}

fn movie_from_row(row: &PgRow) -> Result<Movie, StoreError> {
    let status: String = row.try_get("status").map_err(decode_error)?;

    Ok(Movie {
        id: MovieId::from_uuid(row.try_get("id").map_err(decode_error)?),
        title: row.try_get("title").map_err(decode_error)?,
        duration_minutes: from_int(
            row.try_get("duration_minutes").map_err(decode_error)?,
            "duration_minutes",
        )?,
        status: parse_status(&status)?,
        release_date: row.try_get("release_date").map_err(decode_error)?,
    })
}
