//! Schedule conflict checking and screening scheduling.
//!
//! Two screenings conflict when they sit on the same screen, on the same local
//! calendar day, and share an identical time label. Labels are opaque strings:
//! `"9:30 PM"` and `"21:30"` do not conflict, and runtimes are not considered.
//!
//! Writes to a screen's day run inside a per-`(screen, date)` critical section so
//! two concurrent edits cannot both pass the check against a stale snapshot.

use crate::environment::EngineEnvironment;
use crate::locks::KeyedLocks;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use showtime_core::{
    EngineError, MovieId, Result, Screen, ScreenId, Screening, ScreeningId, ShowTime,
    ShowingStatus,
};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Inclusive bounds of the conflict window for a calendar day:
/// `00:00:00.000` through `23:59:59.999`.
#[must_use]
pub fn conflict_window(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .map_or(start, |t| date.and_time(t));
    (start, end)
}

/// A proposed time-slot assignment for a screening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleProposal {
    /// The screening being validated (excluded from the comparison set on update)
    pub screening_id: Option<ScreeningId>,
    /// Target screen
    pub screen_id: Option<ScreenId>,
    /// Target day
    pub show_date: NaiveDate,
    /// Candidate time labels
    pub show_times: BTreeSet<ShowTime>,
    /// Scheduling status the screening will have
    pub status: ShowingStatus,
}

impl ScheduleProposal {
    /// Whether the proposal takes part in conflict checking at all
    #[must_use]
    pub fn is_exempt(&self) -> bool {
        self.status != ShowingStatus::NowShowing
            || self.screen_id.is_none()
            || self.show_times.is_empty()
    }

    fn from_screening(screening: &Screening) -> Self {
        Self {
            screening_id: Some(screening.id),
            screen_id: screening.screen_id,
            show_date: screening.show_date,
            show_times: screening.show_times.clone(),
            status: screening.status,
        }
    }
}

/// Outcome of a conflict check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// No overlap
    Accept,
    /// Overlapping labels, sorted and deduplicated
    Reject {
        /// Labels already taken on that screen and day
        conflicting_times: Vec<ShowTime>,
    },
}

/// Pure conflict check of `proposal` against `existing` screenings.
///
/// Only other, actively scheduled screenings on the same screen and day count.
#[must_use]
pub fn check_conflicts(proposal: &ScheduleProposal, existing: &[Screening]) -> ScheduleDecision {
    if proposal.is_exempt() {
        return ScheduleDecision::Accept;
    }

    let (window_start, window_end) = conflict_window(proposal.show_date);
    let taken: BTreeSet<&ShowTime> = existing
        .iter()
        .filter(|other| Some(other.id) != proposal.screening_id)
        .filter(|other| other.occupies_slots() && other.screen_id == proposal.screen_id)
        .filter(|other| {
            let (start, _) = conflict_window(other.show_date);
            start >= window_start && start <= window_end
        })
        .flat_map(|other| other.show_times.iter())
        .collect();

    let conflicting_times: Vec<ShowTime> = proposal
        .show_times
        .iter()
        .filter(|time| taken.contains(time))
        .cloned()
        .collect();

    if conflicting_times.is_empty() {
        ScheduleDecision::Accept
    } else {
        ScheduleDecision::Reject { conflicting_times }
    }
}

/// Critical-section key for schedule writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScreenDay {
    /// Screen
    pub screen_id: ScreenId,
    /// Day
    pub show_date: NaiveDate,
}

impl fmt::Display for ScreenDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen {} on {}", self.screen_id, self.show_date)
    }
}

/// Fields for a new screening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScreening {
    /// Movie to show
    pub movie_id: MovieId,
    /// Screen, if already assigned
    pub screen_id: Option<ScreenId>,
    /// Day
    pub show_date: NaiveDate,
    /// Time labels
    #[serde(default)]
    pub show_times: BTreeSet<ShowTime>,
    /// Status (defaults to now showing)
    #[serde(default)]
    pub status: ShowingStatus,
}

/// Partial update; absent fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningUpdate {
    /// New screen
    pub screen_id: Option<ScreenId>,
    /// New day
    pub show_date: Option<NaiveDate>,
    /// New time labels
    pub show_times: Option<BTreeSet<ShowTime>>,
    /// New status
    pub status: Option<ShowingStatus>,
}

/// Validates and writes screening schedules.
pub struct Scheduler {
    env: EngineEnvironment,
    locks: KeyedLocks<ScreenDay>,
}

impl Scheduler {
    /// Creates a scheduler whose screen-day sections wait at most `lock_wait`
    #[must_use]
    pub fn new(env: EngineEnvironment, lock_wait: Duration) -> Self {
        Self {
            env,
            locks: KeyedLocks::new(lock_wait),
        }
    }

    /// Read-only conflict check, for pre-validating an admin form.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ScheduleConflict`] with the overlapping labels
    /// - [`EngineError::NotFound`] if the screen does not exist
    #[tracing::instrument(skip(self, proposal), fields(screen_id = ?proposal.screen_id, show_date = %proposal.show_date))]
    pub async fn check(&self, proposal: &ScheduleProposal) -> Result<()> {
        let Some(screen_id) = proposal.screen_id.filter(|_| !proposal.is_exempt()) else {
            return Ok(());
        };
        let screen = self.screen(screen_id).await?;
        let existing = self
            .env
            .screenings
            .on_screen(screen_id, proposal.show_date)
            .await?;
        Self::decide(proposal, &existing, &screen)
    }

    /// Create a screening after checking its slots.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown movie or screen
    /// - [`EngineError::ScheduleConflict`] if a slot is taken
    /// - [`EngineError::Busy`] if the screen-day section is contended past the wait bound
    #[tracing::instrument(skip(self, new), fields(movie_id = %new.movie_id, show_date = %new.show_date))]
    pub async fn create_screening(&self, new: NewScreening) -> Result<Screening> {
        if self.env.catalog.movie(new.movie_id).await?.is_none() {
            return Err(EngineError::not_found("Movie", new.movie_id));
        }

        let now = self.env.clock.now();
        let screening = Screening {
            id: ScreeningId::new(),
            movie_id: new.movie_id,
            screen_id: new.screen_id,
            show_date: new.show_date,
            show_times: new.show_times,
            status: new.status,
            created_at: now,
            updated_at: now,
        };

        self.write_checked(screening).await
    }

    /// Apply a partial update to a screening, re-checking its slots.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::create_screening`], plus [`EngineError::NotFound`]
    /// for an unknown screening.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_screening(
        &self,
        id: ScreeningId,
        update: ScreeningUpdate,
    ) -> Result<Screening> {
        let Some(mut screening) = self.env.screenings.get(id).await? else {
            return Err(EngineError::not_found("Screening", id));
        };

        if let Some(screen_id) = update.screen_id {
            screening.screen_id = Some(screen_id);
        }
        if let Some(show_date) = update.show_date {
            screening.show_date = show_date;
        }
        if let Some(show_times) = update.show_times {
            screening.show_times = show_times;
        }
        if let Some(status) = update.status {
            screening.status = status;
        }
        screening.updated_at = self.env.clock.now();

        self.write_checked(screening).await
    }

    /// Load one screening.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if absent.
    pub async fn screening(&self, id: ScreeningId) -> Result<Screening> {
        self.env
            .screenings
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Screening", id))
    }

    /// List screenings, optionally for one day.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list(&self, show_date: Option<NaiveDate>) -> Result<Vec<Screening>> {
        Ok(self.env.screenings.list(show_date).await?)
    }

    async fn write_checked(&self, screening: Screening) -> Result<Screening> {
        let proposal = ScheduleProposal::from_screening(&screening);

        let Some(screen_id) = screening.screen_id else {
            self.env.screenings.save(&screening).await?;
            return Ok(screening);
        };
        // Exempt screenings still need a real screen behind them.
        let screen = self.screen(screen_id).await?;
        if proposal.is_exempt() {
            self.env.screenings.save(&screening).await?;
            return Ok(screening);
        }

        let key = ScreenDay {
            screen_id,
            show_date: screening.show_date,
        };
        let _section = self
            .locks
            .acquire(key)
            .await
            .map_err(|timeout| EngineError::Busy {
                resource: timeout.key,
            })?;

        let existing = self
            .env
            .screenings
            .on_screen(screen_id, screening.show_date)
            .await?;
        Self::decide(&proposal, &existing, &screen)?;

        self.env.screenings.save(&screening).await?;
        tracing::info!(
            screening_id = %screening.id,
            screen = %screen.name,
            show_date = %screening.show_date,
            slots = screening.show_times.len(),
            "Screening scheduled"
        );
        Ok(screening)
    }

    fn decide(proposal: &ScheduleProposal, existing: &[Screening], screen: &Screen) -> Result<()> {
        match check_conflicts(proposal, existing) {
            ScheduleDecision::Accept => Ok(()),
            ScheduleDecision::Reject { conflicting_times } => {
                metrics::counter!("showtime_schedule_conflicts_total").increment(1);
                tracing::warn!(
                    screen = %screen.name,
                    show_date = %proposal.show_date,
                    conflicting = ?conflicting_times,
                    "Schedule conflict"
                );
                Err(EngineError::ScheduleConflict {
                    screen_name: screen.name.clone(),
                    conflicting_times,
                })
            }
        }
    }

    async fn screen(&self, screen_id: ScreenId) -> Result<Screen> {
        let screen = self
            .env
            .catalog
            .screen(screen_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Screen", screen_id))?;
        screen.validate()?;
        Ok(screen)
    }
}
