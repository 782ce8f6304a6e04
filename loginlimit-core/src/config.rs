//! Throttling settings.
//!
//! [`LoginLimitConfig`] carries the six options that drive the rate limiter.
//! It can be built in code, deserialized with serde, or read from
//! `LOGINLIMIT_*` environment variables. Either way it must pass
//! [`LoginLimitConfig::validate`] before a limiter is constructed, so a bad
//! threshold or window is reported at startup instead of silently allowing
//! unlimited attempts.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigurationError, storage::LoginSurface};

/// Upper bound for the per-request delay, in seconds.
pub const MAX_DELAY_SECONDS: u32 = 10;

/// Configuration for the login rate limiter.
///
/// # Example
///
/// ```rust
/// use loginlimit_core::LoginLimitConfig;
/// use chrono::Duration;
///
/// let config = LoginLimitConfig {
///     max_retries: 3,
///     find_time: Duration::minutes(5),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginLimitConfig {
    /// Track failed logins on the public site
    pub enable_frontend_checks: bool,
    /// Track failed logins on the administrative interface
    pub enable_backend_checks: bool,
    /// Number of failures inside the window that triggers a ban
    pub max_retries: u32,
    /// Size of the sliding window attempts are counted over
    #[serde(rename = "find_time_seconds", with = "duration_seconds")]
    pub find_time: Duration,
    /// Never ban by IP address, only by username
    pub disable_ip_check: bool,
    /// Suggest a delay of `min(username attempts, 10)` seconds after each failure
    pub delay_login_on_failure: bool,
}

impl Default for LoginLimitConfig {
    fn default() -> Self {
        Self {
            enable_frontend_checks: false,
            enable_backend_checks: true,
            max_retries: 5,
            find_time: Duration::seconds(300),
            disable_ip_check: false,
            delay_login_on_failure: false,
        }
    }
}

impl LoginLimitConfig {
    /// A configuration that records nothing on either surface.
    pub fn disabled() -> Self {
        Self {
            enable_frontend_checks: false,
            enable_backend_checks: false,
            ..Default::default()
        }
    }

    /// Whether failed logins on `surface` should be tracked.
    pub fn is_enabled_for(&self, surface: LoginSurface) -> bool {
        match surface {
            LoginSurface::Frontend => self.enable_frontend_checks,
            LoginSurface::Backend => self.enable_backend_checks,
        }
    }

    /// Check that the threshold and window are usable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_retries == 0 {
            return Err(ConfigurationError::InvalidMaxRetries);
        }
        if self.find_time.num_seconds() <= 0 {
            return Err(ConfigurationError::InvalidFindTime(
                self.find_time.num_seconds(),
            ));
        }
        Ok(())
    }

    /// Load the configuration from `LOGINLIMIT_*` environment variables.
    ///
    /// Unset variables fall back to [`Default`]. Recognized variables:
    ///
    /// - `LOGINLIMIT_ENABLE_FRONTEND`
    /// - `LOGINLIMIT_ENABLE_BACKEND`
    /// - `LOGINLIMIT_MAX_RETRIES`
    /// - `LOGINLIMIT_FIND_TIME` (seconds)
    /// - `LOGINLIMIT_DISABLE_IP_CHECK`
    /// - `LOGINLIMIT_DELAY_LOGIN`
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            enable_frontend_checks: read_bool(
                &lookup,
                "LOGINLIMIT_ENABLE_FRONTEND",
                defaults.enable_frontend_checks,
            )?,
            enable_backend_checks: read_bool(
                &lookup,
                "LOGINLIMIT_ENABLE_BACKEND",
                defaults.enable_backend_checks,
            )?,
            max_retries: read_parsed(&lookup, "LOGINLIMIT_MAX_RETRIES", defaults.max_retries)?,
            find_time: Duration::seconds(read_parsed(
                &lookup,
                "LOGINLIMIT_FIND_TIME",
                defaults.find_time.num_seconds(),
            )?),
            disable_ip_check: read_bool(
                &lookup,
                "LOGINLIMIT_DISABLE_IP_CHECK",
                defaults.disable_ip_check,
            )?,
            delay_login_on_failure: read_bool(
                &lookup,
                "LOGINLIMIT_DELAY_LOGIN",
                defaults.delay_login_on_failure,
            )?,
        };

        config.validate()?;
        Ok(config)
    }
}

fn read_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn read_parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        let config = LoginLimitConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_enabled_for(LoginSurface::Backend));
        assert!(!config.is_enabled_for(LoginSurface::Frontend));
    }

    #[test]
    fn test_disabled_tracks_nothing() {
        let config = LoginLimitConfig::disabled();
        assert!(!config.is_enabled_for(LoginSurface::Backend));
        assert!(!config.is_enabled_for(LoginSurface::Frontend));
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let config = LoginLimitConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidMaxRetries)
        );
    }

    #[test]
    fn test_non_positive_find_time_rejected() {
        let config = LoginLimitConfig {
            find_time: Duration::zero(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidFindTime(0))
        );

        // Sub-second windows truncate to zero
        let config = LoginLimitConfig {
            find_time: Duration::milliseconds(500),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_uses_defaults_when_unset() {
        let config = LoginLimitConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoginLimitConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_all_options() {
        let config = LoginLimitConfig::from_lookup(lookup(&[
            ("LOGINLIMIT_ENABLE_FRONTEND", "true"),
            ("LOGINLIMIT_ENABLE_BACKEND", "0"),
            ("LOGINLIMIT_MAX_RETRIES", "3"),
            ("LOGINLIMIT_FIND_TIME", "60"),
            ("LOGINLIMIT_DISABLE_IP_CHECK", "yes"),
            ("LOGINLIMIT_DELAY_LOGIN", "on"),
        ]))
        .unwrap();

        assert!(config.enable_frontend_checks);
        assert!(!config.enable_backend_checks);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.find_time, Duration::seconds(60));
        assert!(config.disable_ip_check);
        assert!(config.delay_login_on_failure);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = LoginLimitConfig::from_lookup(lookup(&[("LOGINLIMIT_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidValue {
                key: "LOGINLIMIT_MAX_RETRIES".to_string(),
                value: "many".to_string(),
            }
        );

        let err = LoginLimitConfig::from_lookup(lookup(&[("LOGINLIMIT_DELAY_LOGIN", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_lookup_fails_closed_on_invalid_threshold() {
        let err = LoginLimitConfig::from_lookup(lookup(&[("LOGINLIMIT_FIND_TIME", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidFindTime(0));
    }

    #[test]
    fn test_serde_with_partial_document() {
        let config: LoginLimitConfig =
            serde_json::from_str(r#"{"max_retries": 3, "find_time_seconds": 60}"#).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.find_time, Duration::seconds(60));
        assert!(config.enable_backend_checks);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["find_time_seconds"], 60);
    }
}
