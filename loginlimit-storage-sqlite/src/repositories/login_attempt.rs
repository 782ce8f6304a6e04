//! SQLite implementation of the failed login attempt log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loginlimit_core::{
    Error,
    error::StorageError,
    repositories::LoginAttemptRepository,
    storage::{LoginAttempt, NewLoginAttempt},
};
use sqlx::SqlitePool;

use super::{from_timestamp, saturating_count};

/// SQLite repository for failed login attempts.
pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    /// Create a new SQLite login attempt repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    ip_address: String,
    username: String,
    surface: String,
    attempted_at: i64,
}

impl TryFrom<SqliteLoginAttempt> for LoginAttempt {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        Ok(LoginAttempt {
            id: row.id,
            ip_address: row.ip_address,
            username: row.username,
            surface: row.surface.parse()?,
            attempted_at: from_timestamp(row.attempted_at),
        })
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (ip_address, username, surface, attempted_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, ip_address, username, surface, attempted_at
            "#,
        )
        .bind(&attempt.ip_address)
        .bind(&attempt.username)
        .bind(attempt.surface.as_str())
        .bind(attempt.attempted_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        row.try_into()
    }

    async fn count_by_ip(&self, ip_address: &str, since: DateTime<Utc>) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE ip_address = ? AND attempted_at >= ?
            "#,
        )
        .bind(ip_address)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count login attempts by ip");
            StorageError::Database("Failed to count login attempts by ip".to_string())
        })?;

        Ok(saturating_count(count))
    }

    async fn count_by_username(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE username = ? AND attempted_at >= ?
            "#,
        )
        .bind(username)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count login attempts by username");
            StorageError::Database("Failed to count login attempts by username".to_string())
        })?;

        Ok(saturating_count(count))
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete old login attempts");
                StorageError::Database("Failed to delete old login attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tests::setup_test_db;
    use chrono::Duration;
    use loginlimit_core::LoginSurface;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn attempt(ip: &str, username: &str, attempted_at: DateTime<Utc>) -> NewLoginAttempt {
        NewLoginAttempt {
            ip_address: ip.to_string(),
            username: username.to_string(),
            surface: LoginSurface::Frontend,
            attempted_at,
        }
    }

    #[tokio::test]
    async fn test_record_attempt() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool);

        let recorded = repo
            .record(attempt("192.168.1.1", "alice", at(0)))
            .await
            .expect("Failed to record attempt");

        assert!(recorded.id > 0);
        assert_eq!(recorded.ip_address, "192.168.1.1");
        assert_eq!(recorded.username, "alice");
        assert_eq!(recorded.surface, LoginSurface::Frontend);
        assert_eq!(recorded.attempted_at, at(0));
    }

    #[tokio::test]
    async fn test_counts_are_per_key() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool);

        for i in 0..3 {
            repo.record(attempt("10.0.0.1", "alice", at(i))).await.unwrap();
        }
        repo.record(attempt("10.0.0.1", "bob", at(3))).await.unwrap();
        repo.record(attempt("10.0.0.2", "alice", at(4))).await.unwrap();

        assert_eq!(repo.count_by_ip("10.0.0.1", at(0)).await.unwrap(), 4);
        assert_eq!(repo.count_by_ip("10.0.0.2", at(0)).await.unwrap(), 1);
        assert_eq!(repo.count_by_username("alice", at(0)).await.unwrap(), 4);
        assert_eq!(repo.count_by_username("bob", at(0)).await.unwrap(), 1);
        assert_eq!(repo.count_by_username("carol", at(0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_window_is_inclusive() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool);

        repo.record(attempt("10.0.0.1", "alice", at(0))).await.unwrap();
        repo.record(attempt("10.0.0.1", "alice", at(60))).await.unwrap();

        assert_eq!(repo.count_by_ip("10.0.0.1", at(0)).await.unwrap(), 2);
        assert_eq!(repo.count_by_ip("10.0.0.1", at(1)).await.unwrap(), 1);
        assert_eq!(repo.count_by_username("alice", at(60)).await.unwrap(), 1);
        assert_eq!(
            repo.count_by_username("alice", at(60) + Duration::seconds(1))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_username_compared_exactly() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool);

        repo.record(attempt("10.0.0.1", "Alice", at(0))).await.unwrap();

        assert_eq!(repo.count_by_username("Alice", at(0)).await.unwrap(), 1);
        assert_eq!(repo.count_by_username("alice", at(0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_before() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool);

        repo.record(attempt("10.0.0.1", "alice", at(0))).await.unwrap();
        repo.record(attempt("10.0.0.1", "alice", at(100))).await.unwrap();

        // Strictly before: the attempt at the cutoff survives
        let deleted = repo.delete_before(at(100)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.count_by_ip("10.0.0.1", at(0)).await.unwrap(), 1);
    }
}
