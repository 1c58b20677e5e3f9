//! `PostgreSQL` booking store.
//!
//! A booking is one row in `bookings` plus one row per seat in `booking_seats`.
//! Seat rows carry the screening coordinates and an `active` flag; the partial
//! unique index `booking_seats_held_key` over active rows is what makes
//! [`BookingStore::insert`] conditional. Cancelling a booking clears `active`
//! on its seat rows in the same transaction as the status change.

use crate::codec::{
    db_error, decode_error, from_int, money_from_db, money_to_db, parse_status, to_int, violates,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use showtime_core::store::BookingStore;
use showtime_core::{
    BookedSeat, Booking, BookingId, MovieId, PaymentStatus, ScreenId, ScreeningKey, SeatCoord,
    ShowTime, StoreError, UserId,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique index guarding seat disjointness.
const HELD_SEAT_INDEX: &str = "booking_seats_held_key";

/// Unique index guarding one booking per payment.
const PAYMENT_REFERENCE_INDEX: &str = "bookings_payment_reference_key";

const BOOKING_COLUMNS: &str = r"
    id, user_id, movie_id, screen_id, show_date, show_time, total_amount,
    payment_status, booking_status, payment_reference, created_at, updated_at
";

/// Seat row values converted up front so the transaction only sees driver errors.
struct SeatRow {
    position: i32,
    row: i32,
    col: i32,
    seat_number: String,
    price: i64,
}

/// `PostgreSQL`-backed [`BookingStore`].
///
/// # Example
///
/// ```ignore
/// let store = PostgresBookingStore::new(pool);
/// store.insert(&booking).await?;
/// ```
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_rows(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        total: i64,
        seats: &[SeatRow],
    ) -> Result<(), sqlx::Error> {
        let key = &booking.screening;

        sqlx::query(
            r"
            INSERT INTO bookings (
                id, user_id, movie_id, screen_id, show_date, show_time, total_amount,
                payment_status, booking_status, payment_reference, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.user_id.map(|u| *u.as_uuid()))
        .bind(key.movie_id.as_uuid())
        .bind(key.screen_id.as_uuid())
        .bind(key.show_date)
        .bind(key.show_time.as_str())
        .bind(total)
        .bind(booking.payment_status.as_str())
        .bind(booking.booking_status.as_str())
        .bind(booking.payment_reference.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut **tx)
        .await?;

        let active = booking.holds_seats();
        for seat in seats {
            sqlx::query(
                r"
                INSERT INTO booking_seats (
                    booking_id, position, movie_id, screen_id, show_date, show_time,
                    seat_row, seat_col, seat_number, price, active
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(seat.position)
            .bind(key.movie_id.as_uuid())
            .bind(key.screen_id.as_uuid())
            .bind(key.show_date)
            .bind(key.show_time.as_str())
            .bind(seat.row)
            .bind(seat.col)
            .bind(&seat.seat_number)
            .bind(seat.price)
            .bind(active)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Turn a failed insert into the matching storage error.
    async fn insert_failure(&self, booking: &Booking, error: sqlx::Error) -> StoreError {
        if violates(&error, PAYMENT_REFERENCE_INDEX) {
            metrics::counter!("showtime_store_unique_violations_total", "index" => PAYMENT_REFERENCE_INDEX)
                .increment(1);
            return StoreError::DuplicatePaymentReference(
                booking.payment_reference.clone().unwrap_or_default(),
            );
        }

        if violates(&error, HELD_SEAT_INDEX) {
            metrics::counter!("showtime_store_unique_violations_total", "index" => HELD_SEAT_INDEX)
                .increment(1);
            return match self.held_among(booking).await {
                Ok(taken) if !taken.is_empty() => StoreError::SeatsTaken(taken),
                // The holder released them between the violation and the lookup.
                Ok(_) => {
                    let mut wanted: Vec<SeatCoord> = booking.seat_coords().collect();
                    wanted.sort();
                    StoreError::SeatsTaken(wanted)
                }
                Err(e) => e,
            };
        }

        tracing::error!(booking_id = %booking.id, error = %error, "Booking insert failed");
        db_error(error)
    }

    /// Which of the booking's seats are currently held by someone else.
    async fn held_among(&self, booking: &Booking) -> Result<Vec<SeatCoord>, StoreError> {
        let key = &booking.screening;
        let mut rows = Vec::with_capacity(booking.seats.len());
        let mut cols = Vec::with_capacity(booking.seats.len());
        for seat in &booking.seats {
            rows.push(to_int(seat.row, "seat_row")?);
            cols.push(to_int(seat.col, "seat_col")?);
        }

        let held = sqlx::query(
            r"
            SELECT seat_row, seat_col
            FROM booking_seats
            WHERE active
              AND movie_id = $1 AND screen_id = $2 AND show_date = $3 AND show_time = $4
              AND (seat_row, seat_col) IN (SELECT * FROM UNNEST($5::INTEGER[], $6::INTEGER[]))
            ORDER BY seat_row, seat_col
            ",
        )
        .bind(key.movie_id.as_uuid())
        .bind(key.screen_id.as_uuid())
        .bind(key.show_date)
        .bind(key.show_time.as_str())
        .bind(&rows)
        .bind(&cols)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        held.iter()
            .map(|row| {
                let r: i32 = row.try_get("seat_row").map_err(decode_error)?;
                let c: i32 = row.try_get("seat_col").map_err(decode_error)?;
                Ok(SeatCoord::new(from_int(r, "seat_row")?, from_int(c, "seat_col")?))
            })
            .collect()
    }

    /// Attach seat rows to booking rows, preserving the row order.
    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Booking>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)?;
        let mut seats = self.seats_of(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| booking_from_row(row, seats.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn seats_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<BookedSeat>>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT booking_id, seat_row, seat_col, seat_number, price
            FROM booking_seats
            WHERE booking_id = ANY($1)
            ORDER BY booking_id, position
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut seats: HashMap<Uuid, Vec<BookedSeat>> = HashMap::new();
        for row in &rows {
            let booking_id: Uuid = row.try_get("booking_id").map_err(decode_error)?;
            seats.entry(booking_id).or_default().push(BookedSeat {
                row: from_int(row.try_get("seat_row").map_err(decode_error)?, "seat_row")?,
                col: from_int(row.try_get("seat_col").map_err(decode_error)?, "seat_col")?,
                seat_number: row.try_get("seat_number").map_err(decode_error)?,
                price: money_from_db(row.try_get("price").map_err(decode_error)?)?,
            });
        }
        Ok(seats)
    }

    async fn current_status(&self, id: BookingId) -> Result<Option<PaymentStatus>, StoreError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT payment_status FROM bookings WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        raw.as_deref().map(parse_status).transpose()
    }

    async fn require(&self, id: BookingId) -> Result<Booking, StoreError> {
        self.get(id).await?.ok_or(StoreError::BookingNotFound(id))
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let total = money_to_db(booking.total_amount)?;
        let seats = booking
            .seats
            .iter()
            .enumerate()
            .map(|(position, seat)| {
                Ok(SeatRow {
                    position: i32::try_from(position).map_err(|_| {
                        StoreError::Serialization(format!("seat position {position} overflows"))
                    })?,
                    row: to_int(seat.row, "seat_row")?,
                    col: to_int(seat.col, "seat_col")?,
                    seat_number: seat.seat_number.clone(),
                    price: money_to_db(seat.price)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if let Err(error) = Self::insert_rows(&mut tx, booking, total, &seats).await {
            tx.rollback().await.map_err(db_error)?;
            return Err(self.insert_failure(booking, error).await);
        }
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(seats = seats.len(), "Booking rows written");
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn for_showing(
        &self,
        movie_id: MovieId,
        show_date: NaiveDate,
        show_time: &ShowTime,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE movie_id = $1 AND show_date = $2 AND show_time = $3
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(movie_id.as_uuid())
        .bind(show_date)
        .bind(show_time.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC, id ASC
            "
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn attach_payment_reference(
        &self,
        id: BookingId,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError> {
        let updated = sqlx::query(
            r"
            UPDATE bookings
            SET payment_reference = $2, updated_at = $3
            WHERE id = $1
              AND payment_status = 'Pending'
              AND (payment_reference IS NULL OR payment_reference = $2)
            ",
        )
        .bind(id.as_uuid())
        .bind(reference)
        .bind(now)
        .execute(&self.pool)
        .await;

        match updated {
            Ok(result) if result.rows_affected() > 0 => self.require(id).await,
            Ok(_) => {
                let booking = self.require(id).await?;
                if booking.payment_status == PaymentStatus::Pending {
                    Err(StoreError::DuplicatePaymentReference(
                        booking.payment_reference.unwrap_or_default(),
                    ))
                } else {
                    Err(StoreError::StatusConflict {
                        booking_id: id,
                        expected: PaymentStatus::Pending,
                        actual: booking.payment_status,
                    })
                }
            }
            Err(e) if violates(&e, PAYMENT_REFERENCE_INDEX) => {
                Err(StoreError::DuplicatePaymentReference(reference.to_string()))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    #[tracing::instrument(skip(self, now))]
    async fn transition(
        &self,
        id: BookingId,
        expected: PaymentStatus,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let updated = sqlx::query(
            r"
            UPDATE bookings
            SET payment_status = $3,
                booking_status = CASE WHEN $3 = 'Cancelled' THEN 'Cancelled' ELSE booking_status END,
                updated_at = $4
            WHERE id = $1 AND payment_status = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(db_error)?;
            return match self.current_status(id).await? {
                None => Err(StoreError::BookingNotFound(id)),
                Some(actual) => Err(StoreError::StatusConflict {
                    booking_id: id,
                    expected,
                    actual,
                }),
            };
        }

        if next == PaymentStatus::Cancelled {
            sqlx::query("UPDATE booking_seats SET active = FALSE WHERE booking_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        self.require(id).await
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE payment_status = 'Pending' AND created_at < $1
            ORDER BY created_at ASC
            "
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }
}

fn booking_from_row(row: &PgRow, seats: Vec<BookedSeat>) -> Result<Booking, StoreError> {
    let payment_status: String = row.try_get("payment_status").map_err(decode_error)?;
    let booking_status: String = row.try_get("booking_status").map_err(decode_error)?;
    let show_time: String = row.try_get("show_time").map_err(decode_error)?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(decode_error)?),
        user_id: row
            .try_get::<Option<Uuid>, _>("user_id")
            .map_err(decode_error)?
            .map(UserId::from_uuid),
        screening: ScreeningKey {
            movie_id: MovieId::from_uuid(row.try_get("movie_id").map_err(decode_error)?),
            screen_id: ScreenId::from_uuid(row.try_get("screen_id").map_err(decode_error)?),
            show_date: row.try_get("show_date").map_err(decode_error)?,
            show_time: ShowTime::new(show_time),
        },
        seats,
        total_amount: money_from_db(row.try_get("total_amount").map_err(decode_error)?)?,
        payment_status: parse_status(&payment_status)?,
        booking_status: parse_status(&booking_status)?,
        payment_reference: row.try_get("payment_reference").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}
