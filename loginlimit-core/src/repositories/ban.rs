//! Repository trait for ban records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    error::StorageError,
    storage::{Ban, BanTarget, BanUpsert},
};

/// Keyed store of bans.
///
/// There is at most one ban per IP address and one per username.
/// Implementations should back this with unique constraints and override
/// [`upsert`](Self::upsert) with a single atomic statement where the backend
/// supports it.
#[async_trait]
pub trait BanRepository: Send + Sync + 'static {
    /// Find the ban for a target, if any.
    async fn find(&self, target: &BanTarget) -> Result<Option<Ban>, Error>;

    /// Find every ban matching either the IP address or the username.
    async fn find_any(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
    ) -> Result<Vec<Ban>, Error>;

    /// Store a new ban for `target` stamped with `at`.
    async fn create(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<Ban, Error>;

    /// Refresh the `updated_at` timestamp of an existing ban.
    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<Ban, Error>;

    /// List all bans, most recently updated first.
    async fn list(&self) -> Result<Vec<Ban>, Error>;

    /// Remove the ban for a target.
    ///
    /// # Returns
    ///
    /// `true` if a ban was removed.
    async fn delete(&self, target: &BanTarget) -> Result<bool, Error>;

    /// Create the ban for `target`, or refresh it if it already exists.
    ///
    /// The default implementation is a find followed by a create or touch.
    /// It is only safe when callers serialize access per target; backends
    /// with native upsert support should override it.
    async fn upsert(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<BanUpsert, Error> {
        match self.find(target).await? {
            Some(existing) => Ok(BanUpsert::Renewed(self.touch(existing.id, at).await?)),
            None => match self.create(target, at).await {
                Ok(ban) => Ok(BanUpsert::Created(ban)),
                // Lost a race against another writer, the row exists now
                Err(Error::Storage(StorageError::Constraint(_))) => {
                    let existing = self
                        .find(target)
                        .await?
                        .ok_or(Error::Storage(StorageError::NotFound))?;
                    Ok(BanUpsert::Renewed(self.touch(existing.id, at).await?))
                }
                Err(e) => Err(e),
            },
        }
    }
}
