//! Conversions between domain values and column types.

use showtime_core::{Money, StoreError};

/// Map a driver error onto the storage error.
#[allow(clippy::needless_pass_by_value)] // Used as `map_err(db_error)`
pub(crate) fn db_error(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

/// Map a column decode failure onto the storage error.
#[allow(clippy::needless_pass_by_value)] // Used as `map_err(decode_error)`
pub(crate) fn decode_error(error: sqlx::Error) -> StoreError {
    StoreError::Serialization(error.to_string())
}

pub(crate) fn to_int(value: u32, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{field} {value} does not fit INTEGER")))
}

pub(crate) fn from_int(value: i32, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{field} {value} is negative")))
}

pub(crate) fn money_to_db(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.cents())
        .map_err(|_| StoreError::Serialization(format!("amount {amount} does not fit BIGINT")))
}

pub(crate) fn money_from_db(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Serialization(format!("negative amount {cents}")))
}

/// Parse a status column through the type's `FromStr`.
pub(crate) fn parse_status<T>(raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(StoreError::Serialization)
}

/// Whether the error is a unique violation on the named index.
pub(crate) fn violates(error: &sqlx::Error, index: &str) -> bool {
    if let sqlx::Error::Database(db_err) = error {
        db_err.is_unique_violation() && db_err.constraint() == Some(index)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;
    use showtime_core::PaymentStatus;

    #[test]
    fn integers_reject_out_of_range_values() {
        assert_eq!(to_int(9, "seat_row").unwrap(), 9);
        assert!(to_int(u32::MAX, "seat_row").is_err());
        assert!(from_int(-1, "seat_col").is_err());
    }

    #[test]
    fn money_round_trips_through_bigint() {
        let amount = Money::from_cents(55_000);
        assert_eq!(money_from_db(money_to_db(amount).unwrap()).unwrap(), amount);
        assert!(money_to_db(Money::from_cents(u64::MAX)).is_err());
        assert!(money_from_db(-5).is_err());
    }

    #[test]
    fn unknown_status_is_a_serialization_error() {
        assert_eq!(parse_status::<PaymentStatus>("Paid").unwrap(), PaymentStatus::Paid);
        assert!(matches!(
            parse_status::<PaymentStatus>("Refunded"),
            Err(StoreError::Serialization(_))
        ));
    }
}
