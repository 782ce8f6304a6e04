use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    repositories::{BanRepository, LoginAttemptRepository, RepositoryProvider},
    storage::{Ban, BanTarget, BanUpsert, LoginAttempt, NewLoginAttempt},
};

/// Adapter that wraps a RepositoryProvider and implements the login attempt repository
pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.login_attempt().record(attempt).await
    }

    async fn count_by_ip(&self, ip_address: &str, since: DateTime<Utc>) -> Result<u32, Error> {
        self.provider
            .login_attempt()
            .count_by_ip(ip_address, since)
            .await
    }

    async fn count_by_username(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .login_attempt()
            .count_by_username(username, since)
            .await
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.login_attempt().delete_before(before).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements the ban repository
pub struct BanRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> BanRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> BanRepository for BanRepositoryAdapter<R> {
    async fn find(&self, target: &BanTarget) -> Result<Option<Ban>, Error> {
        self.provider.ban().find(target).await
    }

    async fn find_any(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
    ) -> Result<Vec<Ban>, Error> {
        self.provider.ban().find_any(ip_address, username).await
    }

    async fn create(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<Ban, Error> {
        self.provider.ban().create(target, at).await
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<Ban, Error> {
        self.provider.ban().touch(id, at).await
    }

    async fn list(&self) -> Result<Vec<Ban>, Error> {
        self.provider.ban().list().await
    }

    async fn delete(&self, target: &BanTarget) -> Result<bool, Error> {
        self.provider.ban().delete(target).await
    }

    // Forward explicitly so a backend's atomic upsert is not bypassed by the default
    async fn upsert(&self, target: &BanTarget, at: DateTime<Utc>) -> Result<BanUpsert, Error> {
        self.provider.ban().upsert(target, at).await
    }
}
