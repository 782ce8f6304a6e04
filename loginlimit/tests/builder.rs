//! Tests for the LoginLimit builder pattern

use loginlimit::{LoginLimitBuilder, LoginLimitBuilderError, LoginLimitConfig};

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite() {
    // Test basic builder usage with SQLite
    let limiter = LoginLimitBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build LoginLimit");

    // Health check should work
    limiter.health_check().await.expect("Health check failed");
    assert_eq!(limiter.config(), &LoginLimitConfig::default());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite_pool() {
    // Test builder with existing pool
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    let limiter = LoginLimitBuilder::new()
        .with_sqlite_pool(pool)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build LoginLimit");

    limiter.health_check().await.expect("Health check failed");
    assert!(limiter.list_bans().await.unwrap().is_empty());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_manual_migration() {
    // Test builder without auto-migration (default)
    let limiter = LoginLimitBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .build()
        .await
        .expect("Failed to build LoginLimit");

    // Tables do not exist yet
    assert!(limiter.list_bans().await.is_err());

    // Run migration manually
    limiter.migrate().await.expect("Migration failed");
    assert!(limiter.list_bans().await.unwrap().is_empty());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_config() {
    use chrono::Duration;

    let config = LoginLimitConfig {
        enable_frontend_checks: true,
        max_retries: 3,
        find_time: Duration::minutes(10),
        ..Default::default()
    };

    let limiter = LoginLimitBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .with_config(config.clone())
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build LoginLimit");

    assert_eq!(limiter.config(), &config);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = LoginLimitBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .with_config(LoginLimitConfig {
            max_retries: 0,
            ..Default::default()
        })
        .apply_migrations(true)
        .build()
        .await;

    assert!(matches!(
        result,
        Err(LoginLimitBuilderError::InvalidConfiguration(_))
    ));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_repositories() {
    use loginlimit::SqliteRepositoryProvider;
    use std::sync::Arc;

    let pool = loginlimit_storage_sqlite::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");
    let repositories = Arc::new(SqliteRepositoryProvider::new(pool));

    let limiter = LoginLimitBuilder::new()
        .with_repositories(repositories)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build LoginLimit");

    limiter.health_check().await.expect("Health check failed");
}
