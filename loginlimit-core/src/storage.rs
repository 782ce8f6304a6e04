use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The login entry point a failed attempt came through.
///
/// Each surface is toggled independently in
/// [`LoginLimitConfig`](crate::LoginLimitConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginSurface {
    /// The public site
    #[serde(rename = "FE")]
    Frontend,
    /// The administrative interface
    #[serde(rename = "BE")]
    Backend,
}

impl LoginSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginSurface::Frontend => "FE",
            LoginSurface::Backend => "BE",
        }
    }
}

impl fmt::Display for LoginSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginSurface {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FE" => Ok(LoginSurface::Frontend),
            "BE" => Ok(LoginSurface::Backend),
            other => Err(ValidationError::InvalidSurface(other.to_string())),
        }
    }
}

/// A failed login attempt about to be appended to the attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoginAttempt {
    pub ip_address: String,
    pub username: String,
    pub surface: LoginSurface,
    pub attempted_at: DateTime<Utc>,
}

/// A failed login attempt as stored in the attempt log.
///
/// Attempts are append-only. The IP address may be empty when the client
/// address is unknown; the username never is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: i64,
    pub ip_address: String,
    pub username: String,
    pub surface: LoginSurface,
    pub attempted_at: DateTime<Utc>,
}

/// The key a ban applies to.
///
/// A ban covers exactly one of an IP address or a username, matching the
/// axis whose attempt count crossed the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BanTarget {
    Ip(String),
    Username(String),
}

impl BanTarget {
    pub fn ip(&self) -> Option<&str> {
        match self {
            BanTarget::Ip(ip) => Some(ip),
            BanTarget::Username(_) => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            BanTarget::Ip(_) => None,
            BanTarget::Username(username) => Some(username),
        }
    }
}

impl fmt::Display for BanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanTarget::Ip(ip) => write!(f, "ip:{ip}"),
            BanTarget::Username(username) => write!(f, "username:{username}"),
        }
    }
}

/// A persisted ban record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub id: i64,
    pub ip_address: Option<String>,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed every time the threshold is crossed again
    pub updated_at: DateTime<Utc>,
}

impl Ban {
    /// The key this ban applies to.
    ///
    /// Returns `None` only for a malformed row with neither field set.
    pub fn target(&self) -> Option<BanTarget> {
        match (&self.ip_address, &self.username) {
            (Some(ip), _) => Some(BanTarget::Ip(ip.clone())),
            (None, Some(username)) => Some(BanTarget::Username(username.clone())),
            (None, None) => None,
        }
    }

    /// Whether the ban was created or renewed within `validity` of `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>, validity: chrono::Duration) -> bool {
        self.updated_at + validity > now
    }
}

/// Result of inserting or refreshing a ban.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanUpsert {
    /// No ban existed for the target, a new one was stored
    Created(Ban),
    /// An existing ban had its timestamp refreshed
    Renewed(Ban),
}

impl BanUpsert {
    pub fn ban(&self) -> &Ban {
        match self {
            BanUpsert::Created(ban) | BanUpsert::Renewed(ban) => ban,
        }
    }

    pub fn into_ban(self) -> Ban {
        match self {
            BanUpsert::Created(ban) | BanUpsert::Renewed(ban) => ban,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, BanUpsert::Created(_))
    }
}
