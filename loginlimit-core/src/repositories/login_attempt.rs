//! Repository trait for the failed login attempt log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    storage::{LoginAttempt, NewLoginAttempt},
};

/// Append-only log of failed login attempts.
///
/// Rate limiting is derived entirely from counts over this log, so
/// implementations must offer read-your-writes consistency: a count issued
/// after [`record`](Self::record) returns must include the new row.
///
/// # Window boundary
///
/// Both count methods are inclusive: an attempt made exactly at `since` is
/// counted.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Append a failed attempt.
    ///
    /// # Returns
    ///
    /// The stored `LoginAttempt` with its assigned ID.
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Count attempts from `ip_address` made at or after `since`.
    async fn count_by_ip(&self, ip_address: &str, since: DateTime<Utc>) -> Result<u32, Error>;

    /// Count attempts for `username` made at or after `since`.
    async fn count_by_username(&self, username: &str, since: DateTime<Utc>)
    -> Result<u32, Error>;

    /// Delete attempts made strictly before `before`.
    ///
    /// Only used by retention cleanup, never by the rate limiter itself.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
