//! Service layer for business logic
//!
//! This module contains the rate limiter and its retention task. Both are
//! generic over the repository traits so any storage backend can be
//! plugged in.

pub mod cleanup;
mod locks;
pub mod rate_limiter;

pub use cleanup::AttemptCleanup;
pub use rate_limiter::{FailedLoginOutcome, RateLimiter};
