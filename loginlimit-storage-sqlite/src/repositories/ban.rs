//! SQLite implementation of the ban table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loginlimit_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::BanRepository,
    storage::{Ban, BanTarget, BanUpsert},
};
use sqlx::SqlitePool;

use super::from_timestamp;

/// SQLite repository for bans.
pub struct SqliteBanRepository {
    pool: SqlitePool,
}

impl SqliteBanRepository {
    /// Create a new SQLite ban repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteBan {
    id: i64,
    ip_address: Option<String>,
    username: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteBan> for Ban {
    fn from(row: SqliteBan) -> Self {
        Ban {
            id: row.id,
            ip_address: row.ip_address,
            username: row.username,
            created_at: from_timestamp(row.created_at),
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

/// Column holding the key for `target`.
fn key_column(target: &BanTarget) -> &'static str {
    match target {
        BanTarget::Ip(_) => "ip_address",
        BanTarget::Username(_) => "username",
    }
}

fn key_value(target: &BanTarget) -> &str {
    match target {
        BanTarget::Ip(ip) => ip,
        BanTarget::Username(username) => username,
    }
}

#[async_trait]
impl BanRepository for SqliteBanRepository {
    async fn find(&self, target: &BanTarget) -> Result<Option<Ban>, Error> {
        let row = sqlx::query_as::<_, SqliteBan>(&format!(
            r#"
            SELECT id, ip_address, username, created_at, updated_at
            FROM bans
            WHERE {} = ?
            "#,
            key_column(target)
        ))
        .bind(key_value(target))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, %target, "Failed to find ban");
            StorageError::Database("Failed to find ban".to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn find_any(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
    ) -> Result<Vec<Ban>, Error> {
        // A NULL parameter never compares equal, so absent keys match nothing
        let rows = sqlx::query_as::<_, SqliteBan>(
            r#"
            SELECT id, ip_address, username, created_at, updated_at
            FROM bans
            WHERE ip_address = ? OR username = ?
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(ip_address)
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up bans");
            StorageError::Database("Failed to look up bans".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<Ban, Error> {
        let row = sqlx::query_as::<_, SqliteBan>(
            r#"
            INSERT INTO bans (ip_address, username, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, ip_address, username, created_at, updated_at
            "#,
        )
        .bind(target.ip())
        .bind(target.username())
        .bind(at.timestamp())
        .bind(at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Constraint(format!("Ban already exists for {target}"))
            }
            e => {
                tracing::error!(error = %e, %target, "Failed to create ban");
                StorageError::Database("Failed to create ban".to_string())
            }
        })?;

        Ok(row.into())
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<Ban, Error> {
        let row = sqlx::query_as::<_, SqliteBan>(
            r#"
            UPDATE bans
            SET updated_at = ?
            WHERE id = ?
            RETURNING id, ip_address, username, created_at, updated_at
            "#,
        )
        .bind(at.timestamp())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, id, "Failed to renew ban");
            StorageError::Database("Failed to renew ban".to_string())
        })?
        .ok_or(StorageError::NotFound)?;

        Ok(row.into())
    }

    async fn list(&self) -> Result<Vec<Ban>, Error> {
        let rows = sqlx::query_as::<_, SqliteBan>(
            r#"
            SELECT id, ip_address, username, created_at, updated_at
            FROM bans
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list bans");
            StorageError::Database("Failed to list bans".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, target: &BanTarget) -> Result<bool, Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM bans WHERE {} = ?",
            key_column(target)
        ))
        .bind(key_value(target))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, %target, "Failed to delete ban");
            StorageError::Database("Failed to delete ban".to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert-or-renew in one transaction.
    ///
    /// The insert is a no-op when the key already has a row, which the
    /// unique constraint decides atomically; only then is the existing row
    /// renewed.
    async fn upsert(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<BanUpsert, Error> {
        const CONTEXT: &str = "Failed to upsert ban";

        let mut tx = self.pool.begin().await.map_db_err_with_context(CONTEXT)?;

        let created = sqlx::query_as::<_, SqliteBan>(
            r#"
            INSERT INTO bans (ip_address, username, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING id, ip_address, username, created_at, updated_at
            "#,
        )
        .bind(target.ip())
        .bind(target.username())
        .bind(at.timestamp())
        .bind(at.timestamp())
        .fetch_optional(&mut *tx)
        .await
        .map_db_err_with_context(CONTEXT)?;

        let result = match created {
            Some(row) => BanUpsert::Created(row.into()),
            None => {
                let row = sqlx::query_as::<_, SqliteBan>(&format!(
                    r#"
                    UPDATE bans
                    SET updated_at = ?
                    WHERE {} = ?
                    RETURNING id, ip_address, username, created_at, updated_at
                    "#,
                    key_column(target)
                ))
                .bind(at.timestamp())
                .bind(key_value(target))
                .fetch_optional(&mut *tx)
                .await
                .map_db_err_with_context(CONTEXT)?
                .ok_or(StorageError::NotFound)?;

                BanUpsert::Renewed(row.into())
            }
        };

        tx.commit().await.map_db_err_with_context(CONTEXT)?;

        Ok(result)
    }
}
