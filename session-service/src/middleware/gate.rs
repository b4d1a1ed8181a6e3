use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use http_body_util::{BodyExt, Limited};
use serde::Deserialize;
use service_core::error::AppError;
use std::collections::HashMap;

use super::cookies::build_cookie;
use super::device::client_device;
use crate::config::CookieSettings;
use crate::gate::{BoundSession, GateChain, GateOutcome, GateRequest, RequestContext, ResponseEffects};

const MAX_BUFFERED_BODY: usize = 64 * 1024;

/// Per-route state for [`gate_middleware`].
#[derive(Clone)]
pub struct GateLayerState {
    pub chain: GateChain,
    pub cookies: CookieSettings,
    pub trust_forwarded_headers: bool,
}

#[derive(Deserialize)]
struct BodyToken {
    #[serde(default)]
    token: Option<String>,
}

/// Runs a [`GateChain`] around the inner handler.
///
/// The chain's `RequestContext` is stored in request extensions. A 2xx/3xx
/// response counts as handler success. Effects are applied to every response
/// that got past the gates.
pub async fn gate_middleware(
    State(layer): State<GateLayerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (gate_request, req) = gate_request(&layer, req).await?;

    let outcome = layer
        .chain
        .run(&gate_request, |ctx| async move {
            let mut req = req;
            req.extensions_mut().insert(ctx);
            let response = next.run(req).await;
            let status = response.status();
            if status.is_success() || status.is_redirection() {
                Ok(response)
            } else {
                Err(response)
            }
        })
        .await?;

    let GateOutcome { result, effects } = outcome;
    let mut response = result.unwrap_or_else(|response| response);
    apply_effects(&mut response, &layer.cookies, effects);
    Ok(response)
}

async fn gate_request(layer: &GateLayerState, req: Request) -> Result<(GateRequest, Request), AppError> {
    let device = client_device(
        req.headers(),
        req.extensions(),
        layer.trust_forwarded_headers,
    );
    let mut gate_request = GateRequest::new(device);

    for cookie in CookieJar::from_headers(req.headers()).iter() {
        gate_request = gate_request.with_cookie(cookie.name(), cookie.value());
    }

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            gate_request = gate_request.with_header(name.as_str(), value);
        }
    }

    let query: HashMap<String, String> =
        serde_urlencoded::from_str(req.uri().query().unwrap_or_default()).unwrap_or_default();
    for (name, value) in query {
        gate_request = gate_request.with_query(name, value);
    }

    if !layer.chain.reads_body_token() {
        return Ok((gate_request, req));
    }

    let (parts, body) = req.into_parts();
    let bytes = Limited::new(body, MAX_BUFFERED_BODY)
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    let body_token = serde_json::from_slice::<BodyToken>(&bytes)
        .ok()
        .and_then(|b| b.token);

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok((gate_request.with_body_token(body_token), req))
}

fn apply_effects(response: &mut Response, cookies: &CookieSettings, effects: ResponseEffects) {
    let headers = response.headers_mut();

    for directive in effects.cookies {
        let cookie = build_cookie(cookies, directive);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = %cookie.name(), "Unencodable cookie: {}", e),
        }
    }

    for (name, value) in effects.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::error!(header = %name, "Unencodable response header"),
        }
    }
}

/// The session bound by the session gate.
pub struct CurrentSession(pub BoundSession);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.session.clone())
            .map(CurrentSession)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Session context missing from request extensions"
                ))
            })
    }
}
