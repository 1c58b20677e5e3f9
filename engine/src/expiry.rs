//! Abandonment sweeper.
//!
//! Pending bookings whose abandonment window has passed are cancelled, releasing
//! their seats. Each cancellation is a compare-and-set from `Pending`, so a
//! booking finalized concurrently stays paid.

use crate::environment::EngineEnvironment;
use crate::metrics::record_expired;
use showtime_core::{PaymentStatus, Result, StoreError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cancels pending bookings older than the abandonment window.
#[derive(Clone)]
pub struct AbandonmentSweeper {
    env: EngineEnvironment,
    window: Duration,
}

impl AbandonmentSweeper {
    /// Creates a sweeper for bookings older than `window`
    #[must_use]
    pub const fn new(env: EngineEnvironment, window: Duration) -> Self {
        Self { env, window }
    }

    /// Run one pass. Returns how many bookings were cancelled.
    ///
    /// # Errors
    ///
    /// Propagates storage failures from listing candidates. Bookings that left
    /// `Pending` in the meantime are skipped.
    pub async fn sweep(&self) -> Result<usize> {
        let now = self.env.clock.now();
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
        let Some(cutoff) = now.checked_sub_signed(window) else {
            return Ok(0);
        };

        let candidates = self.env.bookings.pending_created_before(cutoff).await?;
        let mut cancelled = 0;
        for booking in candidates {
            match self
                .env
                .bookings
                .transition(booking.id, PaymentStatus::Pending, PaymentStatus::Cancelled, now)
                .await
            {
                Ok(_) => {
                    cancelled += 1;
                    tracing::info!(
                        booking_id = %booking.id,
                        created_at = %booking.created_at,
                        seats = booking.seats.len(),
                        "Abandoned booking cancelled"
                    );
                }
                Err(StoreError::StatusConflict { actual, .. }) => {
                    tracing::debug!(booking_id = %booking.id, status = %actual, "Booking left pending, skipped");
                }
                Err(error) => {
                    tracing::error!(booking_id = %booking.id, error = %error, "Failed to cancel abandoned booking");
                }
            }
        }

        if cancelled > 0 {
            record_expired(cancelled);
        }
        Ok(cancelled)
    }

    /// Run [`AbandonmentSweeper::sweep`] every `interval` until `shutdown` flips to `true`.
    #[must_use]
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(?interval, window = ?self.window, "Abandonment sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(error) = self.sweep().await {
                            tracing::error!(error = %error, "Abandonment sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Abandonment sweeper stopped");
        })
    }
}
