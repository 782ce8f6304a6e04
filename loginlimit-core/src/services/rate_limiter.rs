//! Login rate limiting service.
//!
//! Every failed login is appended to an attempt log. Attempts are then
//! counted per IP address and per username over a sliding window, and a
//! ban is created (or renewed) for whichever key reaches the threshold.
//!
//! # Example
//!
//! ```rust,ignore
//! use loginlimit_core::{LoginLimitConfig, LoginSurface};
//! use loginlimit_core::services::RateLimiter;
//!
//! let limiter = RateLimiter::new(attempts, bans, LoginLimitConfig::default())?;
//!
//! // After the host has decided the login failed
//! let outcome = limiter
//!     .record_failed_login("192.168.1.1", "alice", LoginSurface::Backend)
//!     .await?;
//! if outcome.banned() {
//!     // alert, audit...
//! }
//! tokio::time::sleep(outcome.delay).await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    Error, LoginLimitConfig,
    error::ValidationError,
    clock::{Clock, SystemClock},
    config::MAX_DELAY_SECONDS,
    events::{Event, EventBus},
    repositories::{BanRepository, LoginAttemptRepository},
    services::{AttemptCleanup, locks::KeyedLocks},
    storage::{Ban, BanTarget, BanUpsert, LoginSurface, NewLoginAttempt},
};

/// What a call to [`RateLimiter::record_failed_login`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedLoginOutcome {
    /// Whether the attempt was logged at all
    pub recorded: bool,
    /// Attempts from the IP inside the window, if the IP was checked
    pub ip_attempts: Option<u32>,
    /// Attempts for the username inside the window
    pub username_attempts: u32,
    /// The IP ban created or renewed by this call
    pub ip_ban: Option<BanUpsert>,
    /// The username ban created or renewed by this call
    pub username_ban: Option<BanUpsert>,
    /// How long the caller should hold back its response
    pub delay: Duration,
}

impl FailedLoginOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    /// Whether this call created or renewed any ban.
    pub fn banned(&self) -> bool {
        self.ip_ban.is_some() || self.username_ban.is_some()
    }

    pub fn delay_seconds(&self) -> u64 {
        self.delay.as_secs()
    }
}

/// Service that records failed logins and bans offending keys.
///
/// # Thread Safety
///
/// The service is meant to be shared behind an `Arc`. Counting and ban
/// upserts are serialized per IP address and per username, so concurrent
/// failures for the same key cannot both miss the threshold or create
/// duplicate bans.
pub struct RateLimiter<A: LoginAttemptRepository, B: BanRepository> {
    attempts: Arc<A>,
    bans: Arc<B>,
    config: LoginLimitConfig,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    locks: KeyedLocks,
}

impl<A: LoginAttemptRepository, B: BanRepository> RateLimiter<A, B> {
    /// Create a new RateLimiter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the config does not validate. The
    /// limiter never runs with an undefined threshold.
    pub fn new(attempts: Arc<A>, bans: Arc<B>, config: LoginLimitConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            attempts,
            bans,
            config,
            clock: Arc::new(SystemClock),
            events: None,
            locks: KeyedLocks::new(),
        })
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish failed logins and ban changes on an event bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LoginLimitConfig {
        &self.config
    }

    /// Record a failed login and ban the IP address and/or username if
    /// they reached the threshold.
    ///
    /// Does nothing when the surface is not enabled or the username is
    /// empty. The username is used exactly as submitted. An empty IP
    /// address means the client address is unknown; it is counted and
    /// banned like any other address, so all unknown clients share one key.
    ///
    /// The returned [`FailedLoginOutcome::delay`] is only a suggestion. Use
    /// [`record_failed_login_and_wait`](Self::record_failed_login_and_wait)
    /// to apply it.
    ///
    /// # Errors
    ///
    /// Storage failures are returned as-is. Nothing is rolled back, so the
    /// attempt may stay recorded even if a later ban write fails.
    pub async fn record_failed_login(
        &self,
        ip_address: &str,
        username: &str,
        surface: LoginSurface,
    ) -> Result<FailedLoginOutcome, Error> {
        if !self.config.is_enabled_for(surface) {
            tracing::debug!(%surface, "Login limit checks disabled for surface");
            return Ok(FailedLoginOutcome::skipped());
        }

        if username.is_empty() {
            tracing::debug!(%surface, "Ignoring failed login with empty username");
            return Ok(FailedLoginOutcome::skipped());
        }

        let now = self.clock.now();
        let since = now - self.config.find_time;

        self.attempts
            .record(NewLoginAttempt {
                ip_address: ip_address.to_string(),
                username: username.to_string(),
                surface,
                attempted_at: now,
            })
            .await?;

        let mut outcome = FailedLoginOutcome {
            recorded: true,
            ..Default::default()
        };

        if !self.config.disable_ip_check {
            let target = BanTarget::Ip(ip_address.to_string());
            let count = {
                let _guard = self.locks.lock(&target).await;

                let count = self.attempts.count_by_ip(ip_address, since).await?;
                if count >= self.config.max_retries {
                    outcome.ip_ban = Some(self.bans.upsert(&target, now).await?);
                }
                count
            };
            outcome.ip_attempts = Some(count);

            if let Some(ban) = &outcome.ip_ban {
                self.announce_ban(target, ban, Some(count), now).await;
            }
        }

        {
            let target = BanTarget::Username(username.to_string());
            let count = {
                let _guard = self.locks.lock(&target).await;

                let count = self.attempts.count_by_username(username, since).await?;
                if count >= self.config.max_retries {
                    outcome.username_ban = Some(self.bans.upsert(&target, now).await?);
                }
                count
            };
            outcome.username_attempts = count;

            if let Some(ban) = &outcome.username_ban {
                self.announce_ban(target, ban, Some(count), now).await;
            }
        }

        // Driven by the username count even when only the IP crossed the threshold
        if self.config.delay_login_on_failure {
            let seconds = outcome.username_attempts.min(MAX_DELAY_SECONDS);
            outcome.delay = Duration::from_secs(u64::from(seconds));
        }

        self.emit(Event::LoginFailed {
            ip_address: ip_address.to_string(),
            username: username.to_string(),
            surface,
            ip_attempts: outcome.ip_attempts,
            username_attempts: outcome.username_attempts,
            timestamp: now,
        })
        .await;

        Ok(outcome)
    }

    /// Like [`record_failed_login`](Self::record_failed_login), then wait
    /// out the suggested delay.
    ///
    /// The wait is a timer on the current task, not a blocked thread.
    /// Dropping the returned future (for example because the client went
    /// away) cancels it.
    pub async fn record_failed_login_and_wait(
        &self,
        ip_address: &str,
        username: &str,
        surface: LoginSurface,
    ) -> Result<FailedLoginOutcome, Error> {
        let outcome = self
            .record_failed_login(ip_address, username, surface)
            .await?;

        if !outcome.delay.is_zero() {
            tokio::time::sleep(outcome.delay).await;
        }

        Ok(outcome)
    }

    /// Ban a target directly, or renew its existing ban.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] for an empty IP address or
    /// username, which [`find_active_ban`](Self::find_active_ban) could
    /// never match.
    pub async fn ban(&self, target: BanTarget) -> Result<BanUpsert, Error> {
        let field = match &target {
            BanTarget::Ip(ip) if ip.is_empty() => Some("ip_address"),
            BanTarget::Username(name) if name.is_empty() => Some("username"),
            _ => None,
        };
        if let Some(field) = field {
            return Err(ValidationError::MissingField(field.to_string()).into());
        }

        let (result, now) = {
            let _guard = self.locks.lock(&target).await;
            let now = self.clock.now();
            (self.bans.upsert(&target, now).await?, now)
        };
        self.announce_ban(target, &result, None, now).await;

        Ok(result)
    }

    /// Remove the ban for a target.
    ///
    /// The unknown (empty) IP address can be unbanned; an empty username
    /// is rejected since it is never recorded.
    ///
    /// # Returns
    ///
    /// `true` if a ban existed.
    pub async fn lift_ban(&self, target: BanTarget) -> Result<bool, Error> {
        if target.username().is_some_and(str::is_empty) {
            return Err(ValidationError::MissingField("username".to_string()).into());
        }

        let removed = {
            let _guard = self.locks.lock(&target).await;
            self.bans.delete(&target).await?
        };

        if removed {
            tracing::info!(%target, "Ban lifted");
            self.emit(Event::BanLifted {
                target,
                timestamp: self.clock.now(),
            })
            .await;
        }

        Ok(removed)
    }

    /// Find a ban on either key that was created or renewed within
    /// `validity` of now.
    ///
    /// The limiter never expires bans on its own; hosts that enforce bans
    /// decide how long one stays in force and pass it here.
    pub async fn find_active_ban(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
        validity: chrono::Duration,
    ) -> Result<Option<Ban>, Error> {
        let ip_address = ip_address.filter(|ip| !ip.is_empty());
        let username = username.filter(|name| !name.is_empty());
        if ip_address.is_none() && username.is_none() {
            return Ok(None);
        }

        let now = self.clock.now();
        let bans = self.bans.find_any(ip_address, username).await?;

        Ok(bans
            .into_iter()
            .filter(|ban| ban.is_active_at(now, validity))
            .max_by_key(|ban| ban.updated_at))
    }

    /// Convenience wrapper around [`find_active_ban`](Self::find_active_ban).
    pub async fn is_banned(
        &self,
        ip_address: Option<&str>,
        username: Option<&str>,
        validity: chrono::Duration,
    ) -> Result<bool, Error> {
        Ok(self
            .find_active_ban(ip_address, username, validity)
            .await?
            .is_some())
    }

    /// All bans, most recently updated first.
    pub async fn list_bans(&self) -> Result<Vec<Ban>, Error> {
        self.bans.list().await
    }

    /// Build a retention task for the attempt log sharing this limiter's
    /// repository and clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `retention` is shorter than the
    /// find-time window, which would let pruning shrink open windows.
    pub fn cleanup_task(&self, retention: chrono::Duration) -> Result<AttemptCleanup<A>, Error> {
        AttemptCleanup::new(Arc::clone(&self.attempts), retention, self.config.find_time)
            .map(|cleanup| cleanup.with_clock(Arc::clone(&self.clock)))
    }

    /// Log and publish a ban change. Called after the key lock is released
    /// so slow handlers do not hold up other requests for the same key.
    async fn announce_ban(
        &self,
        target: BanTarget,
        result: &BanUpsert,
        attempts: Option<u32>,
        now: DateTime<Utc>,
    ) {
        let event = match result {
            BanUpsert::Created(_) => {
                tracing::info!(%target, attempts = ?attempts, "Ban issued");
                Event::BanIssued {
                    target,
                    attempts,
                    timestamp: now,
                }
            }
            BanUpsert::Renewed(_) => {
                tracing::info!(%target, attempts = ?attempts, "Ban renewed");
                Event::BanRenewed {
                    target,
                    attempts,
                    timestamp: now,
                }
            }
        };
        self.emit(event).await;
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            if let Err(e) = events.emit(&event).await {
                tracing::warn!(error = %e, "Event handler failed");
            }
        }
    }
}
