//! # loginlimit
//!
//! Brute force protection for login pipelines. Every failed login is logged
//! with the client IP address and the submitted username; attempts are
//! counted over a sliding window and an IP address or username that reaches
//! the threshold is banned.
//!
//! loginlimit only observes failures. It does not authenticate users and it
//! does not refuse logins on its own: hosts enforce bans through
//! [`LoginLimit::find_active_ban`] (or the `loginlimit-axum` middleware).
//!
//! ## Storage Support
//!
//! - SQLite (`sqlite` feature, enabled by default)
//! - Anything implementing [`RepositoryProvider`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use loginlimit::{LoginLimitBuilder, LoginLimitConfig, LoginSurface};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = LoginLimitBuilder::new()
//!         .with_sqlite("sqlite://loginlimit.db")
//!         .await?
//!         .with_config(LoginLimitConfig::from_env()?)
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Called by the login pipeline after a failed authentication
//!     let outcome = limiter
//!         .record_failed_login_and_wait("192.168.1.1", "alice", LoginSurface::Backend)
//!         .await?;
//!     if outcome.banned() {
//!         println!("alice or the client IP address is now banned");
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use loginlimit_core::{BanRepositoryAdapter, LoginAttemptRepositoryAdapter, services::RateLimiter};

pub mod builder;

pub use builder::{LoginLimitBuilder, LoginLimitBuilderError, NoStorage, WithStorage};

/// Re-export core types from loginlimit_core
///
/// These types are commonly used when working with the loginlimit API.
pub use loginlimit_core::{
    Ban, BanTarget, BanUpsert, Clock, Event, EventBus, EventHandler, FailedLoginOutcome,
    LoginLimitConfig, LoginSurface, ManualClock, RepositoryProvider, SystemClock,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use loginlimit_storage_sqlite::SqliteRepositoryProvider;

/// Errors that can occur when using loginlimit.
#[derive(Debug, thiserror::Error)]
pub enum LoginLimitError {
    /// Invalid configuration, reported before any request is handled
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<loginlimit_core::Error> for LoginLimitError {
    fn from(err: loginlimit_core::Error) -> Self {
        use loginlimit_core::Error;

        match err {
            Error::Configuration(e) => LoginLimitError::ConfigError(e.to_string()),
            Error::Validation(e) => LoginLimitError::InvalidInput(e.to_string()),
            Error::Storage(e) => LoginLimitError::StorageError(e.to_string()),
            Error::Event(e) => LoginLimitError::StorageError(e.to_string()),
        }
    }
}

/// The rate limiter type behind a [`LoginLimit`].
pub type Limiter<R> = RateLimiter<LoginAttemptRepositoryAdapter<R>, BanRepositoryAdapter<R>>;

/// The main loginlimit handle.
///
/// Wraps a [`RateLimiter`] built over a single [`RepositoryProvider`]. It is
/// cheap to clone and safe to share between request handlers.
///
/// # Example
///
/// ```rust,no_run
/// use loginlimit::{BanTarget, LoginLimit, LoginLimitConfig, SqliteRepositoryProvider};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
///
///     let limiter = LoginLimit::new(repositories, LoginLimitConfig::default())?;
///     limiter.migrate().await?;
///
///     limiter.ban(BanTarget::Ip("203.0.113.7".to_string())).await?;
///     Ok(())
/// }
/// ```
pub struct LoginLimit<R: RepositoryProvider> {
    repositories: Arc<R>,
    limiter: Arc<Limiter<R>>,
}

impl<R: RepositoryProvider> Clone for LoginLimit<R> {
    fn clone(&self) -> Self {
        Self {
            repositories: Arc::clone(&self.repositories),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<R: RepositoryProvider> LoginLimit<R> {
    /// Create a new loginlimit instance with a repository provider.
    ///
    /// # Errors
    ///
    /// Returns [`LoginLimitError::ConfigError`] if `config` does not validate.
    pub fn new(repositories: Arc<R>, config: LoginLimitConfig) -> Result<Self, LoginLimitError> {
        Self::from_parts(repositories, config, None, None)
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: LoginLimitConfig,
        clock: Option<Arc<dyn Clock>>,
        events: Option<EventBus>,
    ) -> Result<Self, LoginLimitError> {
        let attempts = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));
        let bans = Arc::new(BanRepositoryAdapter::new(repositories.clone()));

        let mut limiter = RateLimiter::new(attempts, bans, config)?;
        if let Some(clock) = clock {
            limiter = limiter.with_clock(clock);
        }
        if let Some(events) = events {
            limiter = limiter.with_event_bus(events);
        }

        Ok(Self {
            repositories,
            limiter: Arc::new(limiter),
        })
    }

    pub fn config(&self) -> &LoginLimitConfig {
        self.limiter.config()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), LoginLimitError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| LoginLimitError::StorageError(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), LoginLimitError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| LoginLimitError::StorageError(e.to_string()))
    }

    /// Record a failed login and ban whatever crossed the threshold.
    ///
    /// The suggested delay is returned, not applied. See
    /// [`RateLimiter::record_failed_login`].
    pub async fn record_failed_login(
        &self,
        ip_address: &str,
        username: &str,
        surface: LoginSurface,
    ) -> Result<FailedLoginOutcome, LoginLimitError> {
        Ok(self
            .limiter
            .record_failed_login(ip_address, username, surface)
            .await?)
    }

    /// Record a failed login, then wait out the suggested delay.
    pub async fn record_failed_login_and_wait(
        &self,
        ip_address: &str,
        username: &str,
        surface: LoginSurface,
    ) -> Result<FailedLoginOutcome, LoginLimitError> {
        Ok(self
            .limiter
            .record_failed_login_and_wait(ip_address, username, surface)
            .await?)
    }

    /// Ban a target directly, or renew its existing ban.
    pub async fn ban(&self, target: BanTarget) -> Result<BanUpsert, LoginLimitError> {
        Ok(self.limiter.ban(target).await?)
    }

    /// Remove a ban.
    ///
    /// # Returns
    ///
    /// `true` if a ban existed.
    pub async fn lift_ban(&self, target: BanTarget) -> Result<bool, LoginLimitError> {
        Ok(self.limiter.lift_ban(target).await?)
    }

    /// Find a ban on either key that is still within `validity`.
    pub async fn find_active_ban(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
        validity: chrono::Duration,
    ) -> Result<Option<Ban>, LoginLimitError> {
        Ok(self
            .limiter
            .find_active_ban(ip_address, username, validity)
            .await?)
    }

    /// All bans, most recently updated first.
    pub async fn list_bans(&self) -> Result<Vec<Ban>, LoginLimitError> {
        Ok(self.limiter.list_bans().await?)
    }

    /// Delete attempts older than `retention` once.
    ///
    /// # Returns
    ///
    /// The number of attempts deleted.
    pub async fn prune_attempts(&self, retention: chrono::Duration) -> Result<u64, LoginLimitError> {
        Ok(self.limiter.cleanup_task(retention)?.run_once().await?)
    }

    /// Start pruning attempts older than `retention` in the background.
    ///
    /// The task runs hourly until `shutdown` changes.
    pub fn start_cleanup_task(
        &self,
        retention: chrono::Duration,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<tokio::task::JoinHandle<()>, LoginLimitError> {
        Ok(self.limiter.cleanup_task(retention)?.start(shutdown))
    }

    /// The underlying rate limiter.
    pub fn limiter(&self) -> &Limiter<R> {
        &self.limiter
    }
}
