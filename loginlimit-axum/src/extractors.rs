use std::{convert::Infallible, net::SocketAddr};

use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

/// The peer address of the connection, as a string.
///
/// Empty when the server was not started with
/// `into_make_service_with_connect_info::<SocketAddr>()`; an empty address
/// is recorded but never counted or banned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();

        Ok(ClientIp(ip))
    }
}
