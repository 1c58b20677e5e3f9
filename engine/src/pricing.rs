//! Seat selection validation and pricing.
//!
//! Screen bounds are authoritative here: every coordinate must fall inside the
//! grid of the screen as it is *now*. Prices come from the screen's seat-type
//! zones, falling back to a flat rate, and are fixed onto the booked seats.

use serde::{Deserialize, Serialize};
use showtime_core::{validate_distinct, BookedSeat, Money, Screen, SeatCoord, ValidationError};

/// A seat the caller wants, optionally with the price their seat map showed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSelection {
    /// Row index
    pub row: u32,
    /// Column index
    pub col: u32,
    /// Price the client displayed; must match the resolved price when present
    #[serde(default, rename = "price")]
    pub quoted_price: Option<Money>,
}

impl SeatSelection {
    /// A selection with no quoted price
    #[must_use]
    pub const fn at(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            quoted_price: None,
        }
    }

    /// A selection carrying the client's quoted price
    #[must_use]
    pub const fn quoted(row: u32, col: u32, price: Money) -> Self {
        Self {
            row,
            col,
            quoted_price: Some(price),
        }
    }

    /// The grid coordinate
    #[must_use]
    pub const fn coord(&self) -> SeatCoord {
        SeatCoord::new(self.row, self.col)
    }
}

/// Resolves seat prices for one screen.
#[derive(Debug, Clone, Copy)]
pub struct PriceList<'a> {
    screen: &'a Screen,
    flat_rate: Money,
}

impl<'a> PriceList<'a> {
    /// Price list for `screen` with `flat_rate` for unzoned seats
    #[must_use]
    pub const fn new(screen: &'a Screen, flat_rate: Money) -> Self {
        Self { screen, flat_rate }
    }

    /// Price of a single seat
    #[must_use]
    pub fn price_of(&self, seat: SeatCoord) -> Money {
        self.screen
            .seat_type_for(seat)
            .map_or(self.flat_rate, |seat_type| seat_type.price)
    }

    /// Validates a selection and prices it.
    ///
    /// Checks, in order: non-empty and distinct, size limit, bounds, quoted
    /// prices, quoted total.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found; nothing is priced partially.
    pub fn price_selection(
        &self,
        selection: &[SeatSelection],
        max_seats: usize,
        quoted_total: Option<Money>,
    ) -> Result<Vec<BookedSeat>, ValidationError> {
        validate_distinct(selection.iter().map(SeatSelection::coord))?;

        if selection.len() > max_seats {
            return Err(ValidationError::TooManySeats {
                requested: selection.len(),
                max: max_seats,
            });
        }

        let mut seats = Vec::with_capacity(selection.len());
        for choice in selection {
            let coord = choice.coord();
            if !self.screen.contains(coord) {
                return Err(ValidationError::SeatOutOfBounds {
                    seat: coord,
                    rows: self.screen.rows,
                    cols: self.screen.cols,
                });
            }

            let price = self.price_of(coord);
            if let Some(quoted) = choice.quoted_price {
                if quoted != price {
                    return Err(ValidationError::PriceMismatch {
                        seat: coord,
                        quoted,
                        actual: price,
                    });
                }
            }
            seats.push(BookedSeat::new(coord, price));
        }

        if let Some(quoted) = quoted_total {
            let actual = Money::checked_sum(seats.iter().map(|s| s.price))
                .ok_or(ValidationError::AmountOverflow)?;
            if quoted != actual {
                return Err(ValidationError::TotalMismatch { quoted, actual });
            }
        }

        Ok(seats)
    }
}
