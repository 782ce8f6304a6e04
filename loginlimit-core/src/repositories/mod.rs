//! Repository traits for data access layer
//!
//! This module defines the repository interfaces that the rate limiter uses to
//! interact with storage.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus lifecycle methods

pub mod adapter;
pub mod ban;
pub mod login_attempt;

pub use adapter::{BanRepositoryAdapter, LoginAttemptRepositoryAdapter};
pub use ban::BanRepository;
pub use login_attempt::LoginAttemptRepository;

use async_trait::async_trait;

use crate::Error;

// ============================================================================
// Individual Repository Provider Traits
// ============================================================================

/// Provider trait for login attempt repository access.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The login attempt repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the login attempt repository
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait for ban repository access.
pub trait BanRepositoryProvider: Send + Sync + 'static {
    /// The ban repository implementation type
    type BanRepo: BanRepository;

    /// Get the ban repository
    fn ban(&self) -> &Self::BanRepo;
}

// ============================================================================
// Unified Repository Provider Trait
// ============================================================================

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement [`LoginAttemptRepository`] and [`BanRepository`] for your backend
/// 2. Implement the two `*RepositoryProvider` traits
/// 3. Implement this trait with `migrate()` and `health_check()`
///
/// ```rust,ignore
/// use loginlimit_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl BanRepositoryProvider for MyStorage {
///     type BanRepo = MyBanRepository;
///     fn ban(&self) -> &Self::BanRepo { &self.bans }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: LoginAttemptRepositoryProvider + BanRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
