//! Schema migrations for loginlimit storage backends.
//!
//! Each backend defines its migrations as [`Migration`] implementations and
//! applies them through a [`MigrationManager`], which records applied
//! versions in a tracking table so running `migrate` twice is a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for loginlimit_core::Error {
    fn from(err: MigrationError) -> Self {
        loginlimit_core::error::StorageError::Migration(err.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.applied_at, 0)
    }
}

/// Reject migration lists that reuse a version number.
///
/// Two migrations sharing a version would make the tracking table
/// ambiguous, so managers call this before applying anything.
pub fn check_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    let mut versions: Vec<i64> = migrations.iter().map(|m| m.version()).collect();
    versions.sort_unstable();
    match versions.windows(2).find(|pair| pair[0] == pair[1]) {
        Some(pair) => Err(MigrationError::DuplicateVersion(pair[0])),
        None => Ok(()),
    }
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_loginlimit_migrations"
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback applied migrations in reverse version order
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;

    /// Versions from `migrations` that have not been applied yet, ascending.
    async fn pending_versions(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<i64>> {
        let applied: Vec<i64> = self
            .get_applied_migrations()
            .await?
            .into_iter()
            .map(|record| record.version)
            .collect();

        let mut pending: Vec<i64> = migrations
            .iter()
            .map(|m| m.version())
            .filter(|version| !applied.contains(version))
            .collect();
        pending.sort_unstable();

        tracing::debug!(count = pending.len(), "Pending migrations");
        Ok(pending)
    }
}
