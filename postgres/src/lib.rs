//! `PostgreSQL` storage for the Showtime booking engine.
//!
//! Implements the storage traits from `showtime-core` on top of sqlx:
//!
//! - [`PostgresBookingStore`]: bookings and their seat rows. Seat disjointness
//!   is enforced by a partial unique index over live seat rows, so two processes
//!   racing for the same seat cannot both commit.
//! - [`PostgresScreeningStore`]: the scheduling side.
//! - [`PostgresCatalog`]: screens and movies.
//!
//! # Example
//!
//! ```ignore
//! use showtime_postgres::{connect, migrate, PostgresBookingStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/showtime", 10, 30).await?;
//!     migrate(&pool).await?;
//!     let bookings = PostgresBookingStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod catalog;
mod codec;
mod screenings;
mod seed;

pub use bookings::PostgresBookingStore;
pub use catalog::PostgresCatalog;
pub use screenings::PostgresScreeningStore;
pub use seed::{house_screens, seed_house_screens};

use showtime_core::StoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Failures while bringing the database up.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Could not open the pool
    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    /// Embedded migrations failed
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Reference data could not be written
    #[error("Seeding failed: {0}")]
    Seed(#[from] StoreError),
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`SetupError::Connect`] if the database is unreachable.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    connect_timeout_secs: u64,
) -> Result<PgPool, SetupError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(connect_timeout_secs))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Database pool ready");
    Ok(pool)
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns [`SetupError::Migrate`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), SetupError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations complete");
    Ok(())
}

/// Cheap liveness probe used by the readiness endpoint.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the database does not answer.
pub async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(codec::db_error)
}
