//! # loginlimit axum integration
//!
//! Extractors, middleware and a handler helper that wire [`loginlimit`] into
//! an axum application.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use axum::{Router, extract::State, routing::post};
//! use loginlimit::{LoginLimitBuilder, LoginSurface, SqliteRepositoryProvider};
//! use loginlimit_axum::{ClientIp, LoginLimitState, record_failed_login, reject_banned};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = LoginLimitBuilder::new()
//!         .with_sqlite("sqlite://loginlimit.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!     let state = LoginLimitState::new(limiter);
//!
//!     let app = Router::new()
//!         .route("/login", post(login_handler))
//!         .layer(axum::middleware::from_fn_with_state(
//!             state.clone(),
//!             reject_banned::<SqliteRepositoryProvider>,
//!         ))
//!         .with_state(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//!
//! async fn login_handler(
//!     State(state): State<LoginLimitState<SqliteRepositoryProvider>>,
//!     client_ip: ClientIp,
//! ) -> loginlimit_axum::Result<&'static str> {
//!     // After the credentials failed to verify:
//!     record_failed_login(&state, &client_ip, "alice", LoginSurface::Frontend).await?;
//!     Ok("Invalid credentials")
//! }
//! ```

mod error;
mod extractors;
mod middleware;

pub use error::{LimitError, Result};
pub use extractors::ClientIp;
pub use middleware::{DEFAULT_BAN_VALIDITY_SECONDS, LoginLimitState, reject_banned};

use loginlimit::{FailedLoginOutcome, LoginSurface};
use loginlimit_core::RepositoryProvider;

/// Record a failed login from a handler and wait out the suggested delay.
///
/// The delay runs inside the handler future, so it is cancelled when the
/// client disconnects and the future is dropped.
pub async fn record_failed_login<R>(
    state: &LoginLimitState<R>,
    client_ip: &ClientIp,
    username: &str,
    surface: LoginSurface,
) -> Result<FailedLoginOutcome>
where
    R: RepositoryProvider,
{
    let outcome = state
        .limiter
        .record_failed_login_and_wait(client_ip.as_str(), username, surface)
        .await?;

    Ok(outcome)
}
