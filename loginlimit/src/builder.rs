//! Builder pattern for constructing LoginLimit instances
//!
//! This module provides a type-safe builder for creating [`LoginLimit`]
//! instances with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use loginlimit::LoginLimitBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let limiter = LoginLimitBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or build without auto-migration and run manually
//!     let limiter = LoginLimitBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .build()
//!         .await?;
//!     limiter.migrate().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use loginlimit_core::{Clock, EventBus, LoginLimitConfig, RepositoryProvider};

use crate::{LoginLimit, LoginLimitError};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a LoginLimit instance.
#[derive(Debug, thiserror::Error)]
pub enum LoginLimitBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<LoginLimitError> for LoginLimitBuilderError {
    fn from(err: LoginLimitError) -> Self {
        match err {
            LoginLimitError::StorageError(msg) => LoginLimitBuilderError::StorageConnection(msg),
            other => LoginLimitBuilderError::InvalidConfiguration(other.to_string()),
        }
    }
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`LoginLimitBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`LoginLimit`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
///
/// # Example
///
/// ```rust,no_run
/// use loginlimit::{LoginLimitBuilder, LoginLimitConfig};
/// use chrono::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let limiter = LoginLimitBuilder::new()
///         .with_sqlite("sqlite::memory:")
///         .await?
///         .with_config(LoginLimitConfig {
///             max_retries: 3,
///             find_time: Duration::minutes(10),
///             ..Default::default()
///         })
///         .apply_migrations(true)
///         .build()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub struct LoginLimitBuilder<Storage> {
    storage: Storage,
    config: LoginLimitConfig,
    clock: Option<Arc<dyn Clock>>,
    events: Option<EventBus>,
    apply_migrations: bool,
}

impl Default for LoginLimitBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginLimitBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Config: [`LoginLimitConfig::default`] (backend only, 5 attempts in 5 minutes)
    /// - Clock: system time
    /// - Event bus: None
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: LoginLimitConfig::default(),
            clock: None,
            events: None,
            apply_migrations: false,
        }
    }

    /// Use any storage backend implementing [`RepositoryProvider`].
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> LoginLimitBuilder<WithStorage<R>> {
        LoginLimitBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            clock: self.clock,
            events: self.events,
            apply_migrations: self.apply_migrations,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl LoginLimitBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// The database file is created if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        LoginLimitBuilder<WithStorage<crate::SqliteRepositoryProvider>>,
        LoginLimitBuilderError,
    > {
        let pool = loginlimit_storage_sqlite::connect(url)
            .await
            .map_err(|e| LoginLimitBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// Use this when you already have a SQLite connection pool and want to
    /// share it with loginlimit.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use loginlimit::LoginLimitBuilder;
    /// use sqlx::SqlitePool;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = SqlitePool::connect("sqlite::memory:").await?;
    ///
    /// let limiter = LoginLimitBuilder::new()
    ///     .with_sqlite_pool(pool)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> LoginLimitBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> LoginLimitBuilder<WithStorage<R>> {
    /// Set the throttling configuration.
    ///
    /// The config is validated in [`build`](Self::build).
    pub fn with_config(mut self, config: LoginLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different time source, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Publish failed logins and ban changes on `events`.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the LoginLimit instance.
    ///
    /// Validates the configuration first, so an invalid threshold never
    /// reaches the database. If `apply_migrations(true)` was called,
    /// migrations are applied before returning.
    pub async fn build(self) -> Result<LoginLimit<R>, LoginLimitBuilderError> {
        self.config
            .validate()
            .map_err(|e| LoginLimitBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| LoginLimitBuilderError::Migration(e.to_string()))?;
        }

        let limiter = LoginLimit::from_parts(
            self.storage.repositories,
            self.config,
            self.clock,
            self.events,
        )?;

        tracing::debug!(config = ?limiter.config(), "Built login limiter");
        Ok(limiter)
    }
}
