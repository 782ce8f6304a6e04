//! SQLite storage backend for loginlimit.
//!
//! Provides [`SqliteRepositoryProvider`], which implements the
//! `loginlimit-core` repository traits on top of a [`SqlitePool`]. Bans are
//! upserted against unique constraints, so the ban table stays consistent
//! even when several processes share one database file.
//!
//! ```rust,ignore
//! use loginlimit_storage_sqlite::{SqliteRepositoryProvider, connect};
//! use loginlimit_core::RepositoryProvider;
//!
//! let pool = connect("sqlite://loginlimit.db").await?;
//! let provider = SqliteRepositoryProvider::new(pool);
//! provider.migrate().await?;
//! ```

pub mod migrations;
pub mod repositories;

pub use migrations::SqliteMigrationManager;
pub use repositories::{SqliteBanRepository, SqliteLoginAttemptRepository, SqliteRepositoryProvider};

use std::str::FromStr;

use loginlimit_core::{Error, error::StorageError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Open a pool for `database_url`, creating the database file if needed.
///
/// In-memory databases are limited to a single connection so every query
/// sees the same data.
pub async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            tracing::error!(error = %e, "Invalid SQLite connection string");
            StorageError::Connection(format!("Invalid SQLite connection string: {e}"))
        })?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new();
    if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        // The database lives and dies with its only connection
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to SQLite");
        StorageError::Connection(format!("Failed to connect to SQLite: {e}"))
    })?;

    tracing::debug!("Connected to SQLite");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginlimit_core::RepositoryProvider;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let provider = SqliteRepositoryProvider::new(pool);

        provider.migrate().await.unwrap();
        provider.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_garbage() {
        let result = connect("postgres://localhost/db").await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Connection(_)))
        ));
    }
}
