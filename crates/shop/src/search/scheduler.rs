//! Deduplicated background rebuilds of the search index.
//!
//! Catalog triggers publish `NOTIFY catalog_changed, '<reason>'`. Each
//! notification schedules a rebuild task. Only one rebuild runs at a time:
//! the running task holds an "in progress" flag in a TTL cache, and a task
//! that finds the flag set (or whose rebuild fails) sleeps and retries a
//! bounded number of times.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{error, info, instrument, warn};

use crate::config::SearchConfig;

use super::{SearchError, SearchIndex, rebuild};

/// Postgres channel catalog triggers notify on.
pub const REBUILD_CHANNEL: &str = "catalog_changed";

const IN_PROGRESS_KEY: &str = "rebuild_in_progress";
const LAST_REBUILD_KEY: &str = "last_rebuild";

/// The flag expires on its own if a rebuild task dies while holding it.
const IN_PROGRESS_TTL: Duration = Duration::from_secs(300);
const LAST_REBUILD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The most recent successful rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastRebuild {
    pub reason: String,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for LastRebuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.completed_at.to_rfc3339(), self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("another rebuild is in progress")]
    Busy,
    #[error(transparent)]
    Failed(#[from] SearchError),
}

/// Schedules index rebuilds.
#[derive(Clone)]
pub struct RebuildScheduler {
    inner: Arc<RebuildSchedulerInner>,
}

struct RebuildSchedulerInner {
    pool: PgPool,
    index: SearchIndex,
    flags: Cache<&'static str, ()>,
    history: Cache<&'static str, LastRebuild>,
    retry_delay: Duration,
    max_retries: u32,
}

impl RebuildScheduler {
    #[must_use]
    pub fn new(pool: PgPool, index: SearchIndex, config: &SearchConfig) -> Self {
        let flags = Cache::builder()
            .max_capacity(1)
            .time_to_live(IN_PROGRESS_TTL)
            .build();
        let history = Cache::builder()
            .max_capacity(1)
            .time_to_live(LAST_REBUILD_TTL)
            .build();

        Self {
            inner: Arc::new(RebuildSchedulerInner {
                pool,
                index,
                flags,
                history,
                retry_delay: config.rebuild_retry_delay,
                max_retries: config.rebuild_max_retries,
            }),
        }
    }

    /// Whether a rebuild currently holds the flag.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.inner.flags.contains_key(&IN_PROGRESS_KEY)
    }

    /// The last successful rebuild within the past 24 hours.
    pub async fn last_rebuild(&self) -> Option<LastRebuild> {
        self.inner.history.get(&LAST_REBUILD_KEY).await
    }

    /// Spawn a rebuild task for `reason`.
    pub fn schedule(&self, reason: impl Into<String>) {
        let scheduler = self.clone();
        let reason = reason.into();
        tokio::spawn(async move { scheduler.run(reason).await });
    }

    #[instrument(skip(self))]
    async fn run(self, reason: String) {
        info!("Starting search index rebuild task");

        let mut retries = 0;
        loop {
            match self.attempt(&reason).await {
                Ok(docs) => {
                    info!(docs, "Search index rebuild completed");
                    return;
                }
                Err(e) if retries < self.inner.max_retries => {
                    retries += 1;
                    warn!(
                        error = %e,
                        retry = retries,
                        delay_secs = self.inner.retry_delay.as_secs(),
                        "Search index rebuild deferred"
                    );
                    tokio::time::sleep(self.inner.retry_delay).await;
                }
                Err(e) => {
                    error!(error = %e, retries, "Search index rebuild abandoned");
                    return;
                }
            }
        }
    }

    /// Claim the flag, rebuild, and release the flag.
    async fn attempt(&self, reason: &str) -> Result<u64, AttemptError> {
        let claim = self
            .inner
            .flags
            .entry(IN_PROGRESS_KEY)
            .or_insert(())
            .await;
        if !claim.is_fresh() {
            return Err(AttemptError::Busy);
        }

        let result = rebuild(&self.inner.pool, &self.inner.index).await;
        self.inner.flags.invalidate(&IN_PROGRESS_KEY).await;
        let docs = result?;

        let last = LastRebuild {
            reason: reason.to_owned(),
            completed_at: Utc::now(),
        };
        info!(last = %last, "Rebuild reason logged");
        self.inner.history.insert(LAST_REBUILD_KEY, last).await;

        Ok(docs)
    }

    /// Listen for catalog notifications and schedule a rebuild for each.
    ///
    /// Runs until the listener connection fails for good.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the listener.
    pub async fn listen(self) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.inner.pool).await?;
        listener.listen(REBUILD_CHANNEL).await?;
        info!(channel = REBUILD_CHANNEL, "Listening for catalog changes");

        loop {
            let notification = listener.recv().await?;
            self.schedule(notification.payload());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn scheduler() -> RebuildScheduler {
        // Never connects: only the cache-backed flag is exercised.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shoppingify_test")
            .unwrap();
        RebuildScheduler::new(pool, SearchIndex::new(), &SearchConfig::default())
    }

    #[tokio::test]
    async fn test_busy_flag_rejects_second_attempt() {
        let scheduler = scheduler();
        scheduler
            .inner
            .flags
            .insert(IN_PROGRESS_KEY, ())
            .await;
        assert!(scheduler.in_progress());

        let result = scheduler.attempt("product created: lamp").await;
        assert!(matches!(result, Err(AttemptError::Busy)));
        assert!(scheduler.in_progress());
        assert!(scheduler.last_rebuild().await.is_none());
    }

    #[test]
    fn test_last_rebuild_display() {
        let last = LastRebuild {
            reason: "manual".to_owned(),
            completed_at: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        assert_eq!(last.to_string(), "2026-03-01T12:00:00+00:00: manual");
    }
}
