pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Invalid throttling settings.
///
/// These are raised when a [`LoginLimitConfig`](crate::LoginLimitConfig) is
/// validated, which happens once at startup rather than per request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("max_retries must be greater than zero")]
    InvalidMaxRetries,

    #[error("find_time must be a positive number of seconds, got {0}")]
    InvalidFindTime(i64),

    #[error("retention period ({retention}s) must not be shorter than find_time ({find_time}s)")]
    InvalidRetention { retention: i64, find_time: i64 },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid login surface: {0}")]
    InvalidSurface(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");

        let config_error = Error::Configuration(ConfigurationError::InvalidMaxRetries);
        assert_eq!(
            config_error.to_string(),
            "Configuration error: max_retries must be greater than zero"
        );

        let validation_error =
            Error::Validation(ValidationError::InvalidSurface("XX".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid login surface: XX"
        );
    }

    #[test]
    fn test_configuration_error_variants() {
        let find_time = ConfigurationError::InvalidFindTime(-5);
        assert_eq!(
            find_time.to_string(),
            "find_time must be a positive number of seconds, got -5"
        );

        let retention = ConfigurationError::InvalidRetention {
            retention: 60,
            find_time: 300,
        };
        assert_eq!(
            retention.to_string(),
            "retention period (60s) must not be shorter than find_time (300s)"
        );

        let invalid = ConfigurationError::InvalidValue {
            key: "LOGINLIMIT_MAX_RETRIES".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "Invalid value for LOGINLIMIT_MAX_RETRIES: abc"
        );
    }

    #[test]
    fn test_storage_error_variants() {
        let db_error = StorageError::Database("connection failed".to_string());
        assert_eq!(db_error.to_string(), "Database error: connection failed");

        let constraint = StorageError::Constraint("UNIQUE constraint failed".to_string());
        assert_eq!(
            constraint.to_string(),
            "Constraint violation: UNIQUE constraint failed"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Storage(StorageError::NotFound).is_storage_error());
        assert!(!Error::Storage(StorageError::NotFound).is_configuration_error());
        assert!(Error::Configuration(ConfigurationError::InvalidMaxRetries).is_configuration_error());
        assert!(
            Error::Validation(ValidationError::MissingField("username".to_string()))
                .is_validation_error()
        );
        assert!(
            Error::Validation(ValidationError::InvalidSurface("XX".to_string()))
                .is_validation_error()
        );
        assert!(!Error::Event(EventError::HandlerError("x".to_string())).is_validation_error());
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = ConfigurationError::InvalidMaxRetries.into();
        assert!(matches!(
            error,
            Error::Configuration(ConfigurationError::InvalidMaxRetries)
        ));

        let error: Error = StorageError::Connection("refused".to_string()).into();
        assert!(matches!(error, Error::Storage(StorageError::Connection(_))));
    }
}
