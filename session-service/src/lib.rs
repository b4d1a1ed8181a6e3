pub mod clock;
pub mod config;
pub mod dtos;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use crate::clock::Clock;
use crate::config::Settings;
use crate::gate::{CsrfGate, GateChain, SessionGate, StepUpGate};
use crate::middleware::{gate_middleware, GateLayerState};
use crate::services::{
    AccountRepository, AccountService, AuthService, CredentialStore, SessionManager,
    SessionStore, TokenSigner,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sessions: SessionManager,
    pub auth: AuthService,
    pub accounts: AccountService,
}

impl AppState {
    /// Wires the services over the given stores. Fails when the step-up
    /// signing key is missing.
    pub fn new(
        settings: Settings,
        session_store: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        repository: Arc<dyn AccountRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let store_timeout = settings.session.store_timeout();

        let sessions = SessionManager::new(
            session_store,
            clock.clone(),
            settings.session.ttl(),
            store_timeout,
        );

        let tokens = TokenSigner::new(
            &settings.step_up.signing_key,
            settings.step_up.ttl(),
            clock.clone(),
        )
        .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        let auth = AuthService::new(
            credentials.clone(),
            sessions.clone(),
            tokens,
            store_timeout,
        );
        let accounts = AccountService::new(credentials, repository, clock, store_timeout);

        Ok(Self {
            settings: Arc::new(settings),
            sessions,
            auth,
            accounts,
        })
    }

    fn gate_layer(&self, chain: GateChain) -> GateLayerState {
        GateLayerState {
            chain,
            cookies: self.settings.cookie.clone(),
            trust_forwarded_headers: self.settings.server.trust_forwarded_headers,
        }
    }

    fn session_gate(&self) -> SessionGate {
        SessionGate::new(
            self.sessions.clone(),
            self.settings.session.cookie_name.clone(),
        )
    }
}

pub fn build_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    // Gate chains, one per protection level
    let issue_csrf = state.gate_layer(GateChain::new().then(CsrfGate::issuing(&settings.csrf)));
    let session_only = state.gate_layer(GateChain::new().then(state.session_gate()));
    let session_csrf = state.gate_layer(
        GateChain::new()
            .then(state.session_gate())
            .then(CsrfGate::verifying(&settings.csrf)),
    );
    let step_up = state.gate_layer(
        GateChain::new()
            .then(state.session_gate())
            .then(CsrfGate::verifying(&settings.csrf))
            .then(StepUpGate::new(state.auth.tokens().clone())),
    );

    let v1 = Router::new()
        .route("/account", post(handlers::account::register))
        .route(
            "/account/me",
            get(handlers::account::me)
                .layer(from_fn_with_state(session_only.clone(), gate_middleware)),
        )
        .route(
            "/auth/login",
            post(handlers::auth::login).layer(from_fn_with_state(issue_csrf, gate_middleware)),
        )
        .route(
            "/auth/logout",
            post(handlers::auth::logout)
                .layer(from_fn_with_state(session_csrf.clone(), gate_middleware)),
        )
        .route(
            "/auth/token",
            post(handlers::auth::issue_token)
                .layer(from_fn_with_state(session_csrf, gate_middleware)),
        )
        .route(
            "/session",
            get(handlers::session::list_sessions)
                .layer(from_fn_with_state(session_only, gate_middleware)),
        )
        .route(
            "/session",
            delete(handlers::session::terminate_other_sessions)
                .layer(from_fn_with_state(step_up.clone(), gate_middleware)),
        )
        .route(
            "/session/:id",
            delete(handlers::session::terminate_session)
                .layer(from_fn_with_state(step_up, gate_middleware)),
        );

    Router::new()
        .route("/ping", get(handlers::health::ping))
        .route("/health", get(handlers::health::health_check))
        .nest("/v1", v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}
