//! Request gates: pass/fail filters run before a handler.
//!
//! A [`GateChain`] holds the gates of one route in fixed stage order
//! (session, CSRF, step-up). It knows nothing about HTTP; the axum adapter in
//! `crate::middleware` builds a [`GateRequest`] from the incoming request and
//! applies the returned [`ResponseEffects`] to the outgoing response.

mod csrf;
mod session;
mod step_up;

pub use csrf::{CsrfGate, CsrfMode, CsrfToken};
pub use session::SessionGate;
pub use step_up::StepUpGate;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

use crate::models::Device;

/// Position of a gate in a chain. Chains always run in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Session,
    Csrf,
    StepUp,
}

/// Everything a gate may inspect, detached from the transport.
#[derive(Debug, Clone)]
pub struct GateRequest {
    cookies: HashMap<String, String>,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body_token: Option<String>,
    device: Device,
}

impl GateRequest {
    pub fn new(device: Device) -> Self {
        Self {
            cookies: HashMap::new(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body_token: None,
            device,
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Header names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body_token(mut self, token: Option<String>) -> Self {
        self.body_token = token;
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body_token(&self) -> Option<&str> {
        self.body_token.as_deref()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Identity bound by the session gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSession {
    pub account_id: String,
    pub session_id: String,
}

/// Typed per-request context, filled in by gates and read by handlers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session: Option<BoundSession>,
}

/// A cookie to set on the response. Path, domain and `Secure` come from the
/// cookie settings applied by the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub max_age_seconds: i64,
    pub http_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseEffects {
    pub cookies: Vec<CookieDirective>,
    pub headers: Vec<(String, String)>,
}

impl ResponseEffects {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized,
    Forbidden,
    Internal,
}

/// A gate refused the request. `reason` is for logs only.
#[derive(Debug, Error)]
#[error("{gate} gate rejected request: {reason}")]
pub struct GateRejection {
    pub gate: &'static str,
    pub kind: Rejection,
    pub reason: String,
}

impl GateRejection {
    pub fn unauthorized(gate: &'static str, reason: impl Into<String>) -> Self {
        Self {
            gate,
            kind: Rejection::Unauthorized,
            reason: reason.into(),
        }
    }

    pub fn forbidden(gate: &'static str, reason: impl Into<String>) -> Self {
        Self {
            gate,
            kind: Rejection::Forbidden,
            reason: reason.into(),
        }
    }

    pub fn internal(gate: &'static str, reason: impl Into<String>) -> Self {
        Self {
            gate,
            kind: Rejection::Internal,
            reason: reason.into(),
        }
    }
}

impl From<GateRejection> for AppError {
    fn from(rejection: GateRejection) -> Self {
        match rejection.kind {
            Rejection::Unauthorized => AppError::Unauthorized(anyhow::anyhow!("Unauthorized")),
            Rejection::Forbidden => AppError::Forbidden(anyhow::anyhow!("Forbidden")),
            Rejection::Internal => AppError::InternalError(anyhow::Error::new(rejection)),
        }
    }
}

#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &'static str;

    fn stage(&self) -> Stage;

    /// Whether the gate looks at a `token` field in a JSON body. The adapter
    /// only buffers bodies for chains that need it.
    fn reads_body_token(&self) -> bool {
        false
    }

    async fn admit(
        &self,
        request: &GateRequest,
        ctx: &mut RequestContext,
    ) -> Result<(), GateRejection>;

    /// Runs after the handler for every admitted request, whatever the
    /// handler returned.
    async fn complete(
        &self,
        _request: &GateRequest,
        _ctx: &RequestContext,
        _handler_succeeded: bool,
        _effects: &mut ResponseEffects,
    ) -> Result<(), GateRejection> {
        Ok(())
    }
}

/// Handler result plus the effects collected from the gates.
#[derive(Debug)]
pub struct GateOutcome<T, E> {
    pub result: Result<T, E>,
    pub effects: ResponseEffects,
}

#[derive(Clone, Default)]
pub struct GateChain {
    gates: Vec<Arc<dyn Gate>>,
}

impl GateChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a gate; the chain re-orders itself by stage.
    pub fn then(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Arc::new(gate));
        self.gates.sort_by_key(|g| g.stage());
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn reads_body_token(&self) -> bool {
        self.gates.iter().any(|g| g.reads_body_token())
    }

    /// Runs every gate's `admit` in order and stops at the first rejection.
    pub async fn admit(&self, request: &GateRequest) -> Result<RequestContext, GateRejection> {
        let mut ctx = RequestContext::default();
        for gate in &self.gates {
            if let Err(rejection) = gate.admit(request, &mut ctx).await {
                log_rejection(&rejection);
                return Err(rejection);
            }
        }
        Ok(ctx)
    }

    pub async fn complete(
        &self,
        request: &GateRequest,
        ctx: &RequestContext,
        handler_succeeded: bool,
    ) -> Result<ResponseEffects, GateRejection> {
        let mut effects = ResponseEffects::default();
        for gate in &self.gates {
            if let Err(rejection) = gate
                .complete(request, ctx, handler_succeeded, &mut effects)
                .await
            {
                log_rejection(&rejection);
                return Err(rejection);
            }
        }
        Ok(effects)
    }

    /// Admits the request, runs `handler`, then collects the response effects
    /// of every gate. The handler never runs if a gate rejects.
    pub async fn run<F, Fut, T, E>(
        &self,
        request: &GateRequest,
        handler: F,
    ) -> Result<GateOutcome<T, E>, GateRejection>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ctx = self.admit(request).await?;
        let result = handler(ctx.clone()).await;

        let effects = self.complete(request, &ctx, result.is_ok()).await?;

        Ok(GateOutcome { result, effects })
    }
}

fn log_rejection(rejection: &GateRejection) {
    match rejection.kind {
        Rejection::Internal => tracing::error!(
            gate = rejection.gate,
            reason = %rejection.reason,
            "Gate failed"
        ),
        _ => tracing::warn!(
            gate = rejection.gate,
            kind = ?rejection.kind,
            reason = %rejection.reason,
            "Request rejected by gate"
        ),
    }
}
