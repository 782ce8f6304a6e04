//! Retention for the failed login attempt log.
//!
//! The rate limiter itself never deletes attempts. Deployments that do not
//! want the log to grow forever can run an [`AttemptCleanup`] in the
//! background.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::{
    Error,
    clock::{Clock, SystemClock},
    error::ConfigurationError,
    repositories::LoginAttemptRepository,
};

/// Cleanup runs hourly by default
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodically deletes attempts older than a retention period.
pub struct AttemptCleanup<A: LoginAttemptRepository> {
    repository: Arc<A>,
    retention: ChronoDuration,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl<A: LoginAttemptRepository> AttemptCleanup<A> {
    /// Create a cleanup task keeping attempts for `retention`.
    ///
    /// # Errors
    ///
    /// `retention` must be at least `find_time`. Anything shorter would
    /// delete attempts that still count towards an open window, so it is
    /// rejected with [`ConfigurationError::InvalidRetention`].
    pub fn new(
        repository: Arc<A>,
        retention: ChronoDuration,
        find_time: ChronoDuration,
    ) -> Result<Self, Error> {
        if retention < find_time {
            return Err(ConfigurationError::InvalidRetention {
                retention: retention.num_seconds(),
                find_time: find_time.num_seconds(),
            }
            .into());
        }

        Ok(Self {
            repository,
            retention,
            interval: DEFAULT_CLEANUP_INTERVAL,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn retention(&self) -> ChronoDuration {
        self.retention
    }

    /// Delete expired attempts once.
    ///
    /// # Returns
    ///
    /// The number of attempts deleted.
    pub async fn run_once(&self) -> Result<u64, Error> {
        let before = self.clock.now() - self.retention;
        let count = self.repository.delete_before(before).await?;
        if count > 0 {
            tracing::info!(count = count, "Pruned old failed login attempts");
        }
        Ok(count)
    }

    /// Spawn the cleanup loop.
    ///
    /// The first pass runs immediately, then once per interval until
    /// `shutdown` changes. Failed passes are logged and retried on the next
    /// tick.
    pub fn start(
        self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::warn!(
                                error = %e,
                                "Failed to prune failed login attempts"
                            );
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login attempt cleanup task");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        storage::{LoginAttempt, LoginSurface, NewLoginAttempt},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockAttemptRepository {
        attempts: Mutex<Vec<LoginAttempt>>,
        delete_calls: Mutex<u32>,
    }

    impl MockAttemptRepository {
        fn seed(&self, attempted_at: DateTime<Utc>) {
            let mut attempts = self.attempts.lock().unwrap();
            let id = attempts.len() as i64 + 1;
            attempts.push(LoginAttempt {
                id,
                ip_address: "10.0.0.1".to_string(),
                username: "alice".to_string(),
                surface: LoginSurface::Backend,
                attempted_at,
            });
        }
    }

    #[async_trait]
    impl LoginAttemptRepository for MockAttemptRepository {
        async fn record(&self, _attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
            unimplemented!()
        }

        async fn count_by_ip(&self, _ip: &str, _since: DateTime<Utc>) -> Result<u32, Error> {
            unimplemented!()
        }

        async fn count_by_username(&self, _name: &str, _since: DateTime<Utc>) -> Result<u32, Error> {
            unimplemented!()
        }

        async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            *self.delete_calls.lock().unwrap() += 1;
            let mut attempts = self.attempts.lock().unwrap();
            let before_len = attempts.len();
            attempts.retain(|a| a.attempted_at >= before);
            Ok((before_len - attempts.len()) as u64)
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_retention_shorter_than_window_rejected() {
        let result = AttemptCleanup::new(
            Arc::new(MockAttemptRepository::default()),
            ChronoDuration::seconds(60),
            ChronoDuration::seconds(300),
        );
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::InvalidRetention {
                retention: 60,
                find_time: 300
            }))
        ));
    }

    #[tokio::test]
    async fn test_run_once_keeps_attempts_inside_retention() {
        let repo = Arc::new(MockAttemptRepository::default());
        repo.seed(now() - ChronoDuration::days(2));
        repo.seed(now() - ChronoDuration::hours(1));
        repo.seed(now());

        let cleanup = AttemptCleanup::new(
            repo.clone(),
            ChronoDuration::days(1),
            ChronoDuration::seconds(300),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(now())));

        assert_eq!(cleanup.run_once().await.unwrap(), 1);
        assert_eq!(repo.attempts.lock().unwrap().len(), 2);
        assert_eq!(cleanup.run_once().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_until_shutdown() {
        let repo = Arc::new(MockAttemptRepository::default());
        repo.seed(now() - ChronoDuration::days(2));

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = AttemptCleanup::new(
            repo.clone(),
            ChronoDuration::days(1),
            ChronoDuration::seconds(300),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(now())))
        .with_interval(Duration::from_secs(60))
        .start(rx);

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0s, 60s and 120s
        assert_eq!(*repo.delete_calls.lock().unwrap(), 3);
        assert!(repo.attempts.lock().unwrap().is_empty());
    }
}
