//! Reference data: the two house screens.

use crate::catalog::PostgresCatalog;
use showtime_core::{Money, Screen, SeatType, SeatZone, StoreError};

/// Silver (10x10: Standard rows A-H, Executive rows I-J) and Platinum
/// (5x10: Premium rows A-C, VIP rows D-E).
#[must_use]
pub fn house_screens() -> Vec<Screen> {
    vec![
        Screen::new(
            "Silver",
            10,
            10,
            vec![
                seat_type("Standard", 20_000, SeatZone::rows(0, 7)),
                seat_type("Executive", 35_000, SeatZone::rows(8, 9)),
            ],
        ),
        Screen::new(
            "Platinum",
            5,
            10,
            vec![
                seat_type("Premium", 50_000, SeatZone::rows(0, 2)),
                seat_type("VIP", 80_000, SeatZone::rows(3, 4)),
            ],
        ),
    ]
}

fn seat_type(name: &str, cents: u64, zone: SeatZone) -> SeatType {
    SeatType {
        name: name.to_string(),
        price: Money::from_cents(cents),
        zone: Some(zone),
    }
}

/// Create any house screen that does not exist yet (matched by name).
///
/// Returns the screens as stored, existing ones untouched.
///
/// # Errors
///
/// Returns [`StoreError`] if a lookup or insert fails.
pub async fn seed_house_screens(catalog: &PostgresCatalog) -> Result<Vec<Screen>, StoreError> {
    let mut screens = Vec::new();
    for screen in house_screens() {
        if let Some(existing) = catalog.screen_by_name(&screen.name).await? {
            tracing::info!(screen = %existing.name, "Screen already exists");
            screens.push(existing);
        } else {
            catalog.save_screen(&screen).await?;
            tracing::info!(screen = %screen.name, "Screen created");
            screens.push(screen);
        }
    }
    Ok(screens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use showtime_core::SeatCoord;

    #[test]
    fn house_screens_are_consistent() {
        for screen in house_screens() {
            assert!(screen.validate().is_ok(), "{} capacity", screen.name);
        }
    }

    #[test]
    fn zones_cover_every_house_seat() {
        for screen in house_screens() {
            for row in 0..screen.rows {
                for col in 0..screen.cols {
                    assert!(
                        screen.seat_type_for(SeatCoord::new(row, col)).is_some(),
                        "{} seat ({row}, {col}) has no seat type",
                        screen.name
                    );
                }
            }
        }
    }
}
