use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};

use crate::models::Device;
use crate::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Derives the device fingerprint of a request.
///
/// The IP is the first `X-Forwarded-For` hop when `trust_forwarded` is set,
/// otherwise the socket peer. Missing values become empty strings.
pub fn client_device(headers: &HeaderMap, extensions: &Extensions, trust_forwarded: bool) -> Device {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let forwarded = if trust_forwarded {
        headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    let ip = forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_default();

    Device { user_agent, ip }
}

/// Device fingerprint of the caller, for handlers that create sessions.
pub struct ClientDevice(pub Device);

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientDevice {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ClientDevice(client_device(
            &parts.headers,
            &parts.extensions,
            state.settings.server.trust_forwarded_headers,
        )))
    }
}
