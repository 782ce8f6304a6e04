//! Repository implementations for SQLite storage

pub mod ban;
pub mod login_attempt;

pub use ban::SqliteBanRepository;
pub use login_attempt::SqliteLoginAttemptRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loginlimit_core::{
    Error,
    error::StorageError,
    repositories::{BanRepositoryProvider, LoginAttemptRepositoryProvider, RepositoryProvider},
};
use loginlimit_migration::MigrationManager;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::migrations::{self, SqliteMigrationManager};

/// Timestamps are stored as unix seconds.
fn from_timestamp(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

fn saturating_count(count: i64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Repository provider implementation for SQLite
///
/// This struct implements the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    login_attempt: Arc<SqliteLoginAttemptRepository>,
    ban: Arc<SqliteBanRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let login_attempt = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));
        let ban = Arc::new(SqliteBanRepository::new(pool.clone()));

        Self {
            pool,
            login_attempt,
            ban,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

impl BanRepositoryProvider for SqliteRepositoryProvider {
    type BanRepo = SqliteBanRepository;

    fn ban(&self) -> &Self::BanRepo {
        &self.ban
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::from(e)
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// A migrated in-memory database behind a single connection.
    pub(crate) async fn setup_test_db() -> SqlitePool {
        let _ = tracing_subscriber::fmt().try_init();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        SqliteRepositoryProvider::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to run migrations");

        pool
    }

    #[tokio::test]
    async fn test_migrate_twice() {
        let pool = setup_test_db().await;
        let provider = SqliteRepositoryProvider::new(pool);

        provider.migrate().await.expect("Second migrate should be a no-op");
        provider.health_check().await.expect("Health check failed");
    }

    #[tokio::test]
    async fn test_health_check_fails_on_closed_pool() {
        let pool = setup_test_db().await;
        let provider = SqliteRepositoryProvider::new(pool.clone());
        pool.close().await;

        let result = provider.health_check().await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Connection(_)))
        ));
    }

    #[test]
    fn test_timestamp_helpers() {
        assert_eq!(from_timestamp(0).timestamp(), 0);
        assert_eq!(from_timestamp(1_700_000_000).timestamp(), 1_700_000_000);
        assert_eq!(saturating_count(3), 3);
        assert_eq!(saturating_count(i64::MAX), u32::MAX);
    }
}
