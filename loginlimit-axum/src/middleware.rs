use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use loginlimit::LoginLimit;
use loginlimit_core::RepositoryProvider;

use crate::{error::LimitError, extractors::ClientIp};

/// Default time in seconds a ban keeps refusing requests after its last renewal.
pub const DEFAULT_BAN_VALIDITY_SECONDS: i64 = 3600;

/// Shared state for the loginlimit middleware and helpers.
pub struct LoginLimitState<R: RepositoryProvider> {
    pub limiter: LoginLimit<R>,
    /// How long after `updated_at` a ban is enforced
    pub ban_validity: Duration,
}

impl<R: RepositoryProvider> LoginLimitState<R> {
    pub fn new(limiter: LoginLimit<R>) -> Self {
        Self {
            limiter,
            ban_validity: Duration::seconds(DEFAULT_BAN_VALIDITY_SECONDS),
        }
    }

    pub fn with_ban_validity(mut self, ban_validity: Duration) -> Self {
        self.ban_validity = ban_validity;
        self
    }
}

impl<R: RepositoryProvider> Clone for LoginLimitState<R> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            ban_validity: self.ban_validity,
        }
    }
}

/// Refuse requests from a client IP address with an active ban.
///
/// Install with `axum::middleware::from_fn_with_state(state, reject_banned::<R>)`
/// on the routes that accept credentials. Clients whose address is unknown
/// are let through.
pub async fn reject_banned<R>(
    State(state): State<LoginLimitState<R>>,
    client_ip: ClientIp,
    request: Request,
    next: Next,
) -> Result<Response, LimitError>
where
    R: RepositoryProvider,
{
    if !client_ip.is_unknown() {
        let ban = state
            .limiter
            .find_active_ban(Some(client_ip.as_str()), None, state.ban_validity)
            .await?;

        if let Some(ban) = ban {
            tracing::debug!(ip = %client_ip.as_str(), ban_id = ban.id, "Rejecting banned client");
            return Err(LimitError::Banned);
        }
    }

    Ok(next.run(request).await)
}
