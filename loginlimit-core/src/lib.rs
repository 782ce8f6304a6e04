//! Core functionality for the loginlimit project
//!
//! This crate contains the brute force protection logic itself: the
//! [`RateLimiter`] service, its configuration, the storage records it reads
//! and writes, and the repository traits storage backends implement.
//!
//! Storage backends (see `loginlimit-storage-sqlite`) implement
//! [`RepositoryProvider`]. Application code normally goes through the
//! `loginlimit` facade crate rather than using this crate directly.
//!
//! See [`RateLimiter`] for the failed login flow and [`LoginLimitConfig`] for
//! the available settings.
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoginLimitConfig, MAX_DELAY_SECONDS};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler};
pub use repositories::{
    BanRepository, BanRepositoryAdapter, LoginAttemptRepository, LoginAttemptRepositoryAdapter,
    RepositoryProvider,
};
pub use services::{AttemptCleanup, FailedLoginOutcome, RateLimiter};
pub use storage::{Ban, BanTarget, BanUpsert, LoginAttempt, LoginSurface, NewLoginAttempt};
