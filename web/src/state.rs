//! Application state shared across all HTTP handlers.

use showtime_engine::ShowtimeEngine;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: the engine is behind an `Arc` and the pool is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// The booking engine
    pub engine: Arc<ShowtimeEngine>,
    /// Database pool probed by the readiness check; `None` when running on
    /// in-memory stores
    pub database: Option<PgPool>,
}

impl AppState {
    /// State backed by a database.
    #[must_use]
    pub fn new(engine: ShowtimeEngine, database: PgPool) -> Self {
        Self {
            engine: Arc::new(engine),
            database: Some(database),
        }
    }

    /// State without a database (in-memory stores).
    #[must_use]
    pub fn in_memory(engine: ShowtimeEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
