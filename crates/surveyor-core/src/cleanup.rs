//! Periodic background cleanup.
//!
//! One sweep evicts idle rate-limit windows, deletes expired export
//! artifacts, and marks long-idle sessions abandoned. Sweeps work from
//! snapshots of the structures they clean -- the hot request path is never
//! blocked for longer than a single keyed-lock hold.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use std::sync::Arc;
use std::time::{Duration, Instant};

use surveyor_types::config::CleanupConfig;

use crate::ratelimit::RateLimiter;
use crate::session::SessionManager;
use crate::store::SurveyStore;

/// Deletes expired export artifacts. Implemented by the storage layer.
pub trait ArtifactSweeper: Send + Sync {
    /// Remove artifacts older than `retention`; returns how many were
    /// deleted.
    fn sweep_expired(
        &self,
        retention: Duration,
    ) -> impl std::future::Future<Output = std::io::Result<usize>> + Send;
}

impl<A: ArtifactSweeper> ArtifactSweeper for Arc<A> {
    async fn sweep_expired(&self, retention: Duration) -> std::io::Result<usize> {
        (**self).sweep_expired(retention).await
    }
}

/// What one sweep accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub rate_windows_evicted: usize,
    pub artifacts_deleted: usize,
    pub sessions_abandoned: usize,
    pub sessions_evicted: usize,
}

/// Fixed-interval background sweeper.
pub struct CleanupScheduler<S: SurveyStore, A: ArtifactSweeper> {
    config: CleanupConfig,
    rate_limit_idle: Duration,
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionManager<S>>,
    artifacts: A,
}

impl<S: SurveyStore, A: ArtifactSweeper> CleanupScheduler<S, A> {
    pub fn new(
        config: CleanupConfig,
        rate_limit_idle: Duration,
        limiter: Arc<RateLimiter>,
        sessions: Arc<SessionManager<S>>,
        artifacts: A,
    ) -> Self {
        Self {
            config,
            rate_limit_idle,
            limiter,
            sessions,
            artifacts,
        }
    }

    /// Run one sweep immediately.
    pub async fn sweep_once(&self) -> SweepStats {
        let rate_windows_evicted = self
            .limiter
            .evict_idle(self.rate_limit_idle, Instant::now());

        let retention = Duration::from_secs(self.config.export_retention_hours * 3600);
        let artifacts_deleted = match self.artifacts.sweep_expired(retention).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "export artifact sweep failed");
                0
            }
        };

        let sessions_abandoned = self
            .sessions
            .abandon_stale(Duration::from_secs(self.config.session_stale_secs))
            .await;

        let sessions_evicted = self
            .sessions
            .evict_finished(Duration::from_secs(self.config.session_evict_secs))
            .await;

        let stats = SweepStats {
            rate_windows_evicted,
            artifacts_deleted,
            sessions_abandoned,
            sessions_evicted,
        };
        if stats != SweepStats::default() {
            info!(
                rate_windows = stats.rate_windows_evicted,
                artifacts = stats.artifacts_deleted,
                abandoned = stats.sessions_abandoned,
                evicted = stats.sessions_evicted,
                "cleanup sweep"
            );
        }
        stats
    }

    /// Sweep on a fixed interval until cancelled.
    ///
    /// The first tick fires after one full interval, not at startup.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cleanup scheduler stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_types::answer::AnswerRecord;
    use surveyor_types::config::EngineConfig;
    use surveyor_types::error::StoreError;
    use surveyor_types::identity::{Identity, Role};
    use surveyor_types::survey::{Survey, SurveyId};

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal store double; the scheduler never touches survey storage
    /// directly, only through the session manager.
    struct NullStore;

    impl SurveyStore for NullStore {
        async fn create_survey(&self, _: &Survey) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_survey(&self, _: &Survey) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_survey(&self, _: &SurveyId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_survey(&self, _: &SurveyId) -> Result<Option<Survey>, StoreError> {
            Ok(None)
        }
        async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
            Ok(Vec::new())
        }
        async fn record_answer(&self, _: &AnswerRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn answers(&self, _: &SurveyId) -> Result<Vec<AnswerRecord>, StoreError> {
            Ok(Vec::new())
        }
        async fn known_identities(&self) -> Result<Vec<Identity>, StoreError> {
            Ok(Vec::new())
        }
        async fn export_snapshot(&self, _: &SurveyId) -> Result<String, StoreError> {
            Ok(String::new())
        }
    }

    struct CountingSweeper {
        calls: AtomicUsize,
    }

    impl ArtifactSweeper for &CountingSweeper {
        async fn sweep_expired(&self, _retention: Duration) -> std::io::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }
    }

    #[tokio::test]
    async fn sweep_once_reports_every_count() {
        let limiter = Arc::new(RateLimiter::new(Default::default()));
        limiter.admit(Identity::new(1), Role::User);

        let sessions = Arc::new(SessionManager::new(
            Arc::new(NullStore),
            EngineConfig::default(),
        ));
        let sweeper = CountingSweeper {
            calls: AtomicUsize::new(0),
        };

        // Zero idle threshold: the window just created is already stale.
        let scheduler = CleanupScheduler::new(
            CleanupConfig::default(),
            Duration::ZERO,
            limiter.clone(),
            sessions,
            &sweeper,
        );

        let stats = scheduler.sweep_once().await;
        assert_eq!(stats.rate_windows_evicted, 1);
        assert_eq!(stats.artifacts_deleted, 3);
        assert_eq!(stats.sessions_abandoned, 0);
        assert_eq!(stats.sessions_evicted, 0);
        assert_eq!(sweeper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.tracked(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let limiter = Arc::new(RateLimiter::new(Default::default()));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(NullStore),
            EngineConfig::default(),
        ));
        let sweeper = CountingSweeper {
            calls: AtomicUsize::new(0),
        };

        let scheduler = CleanupScheduler::new(
            CleanupConfig {
                interval_secs: 3600,
                ..Default::default()
            },
            Duration::from_secs(3600),
            limiter,
            sessions,
            &sweeper,
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        // Returns promptly instead of waiting out the first interval.
        tokio::time::timeout(Duration::from_secs(1), scheduler.run(cancel))
            .await
            .expect("scheduler should exit on cancellation");
    }
}
