//! Test helpers for session-service integration tests.
//!
//! Builds the full router over in-memory stores and a manual clock, and
//! drives it with `tower::ServiceExt::oneshot`. Forwarded headers are trusted
//! so each test can pick the client IP through `X-Forwarded-For`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use secrecy::Secret;
use service_core::config::Environment;
use session_service::{
    build_router,
    clock::ManualClock,
    config::{
        CookieSettings, CsrfSettings, LoggingSettings, MongoSettings, PostgresSettings,
        ServerSettings, SessionSettings, Settings, StepUpSettings,
    },
    services::{MemoryCredentialStore, MemorySessionStore, NewAccount},
    utils::Password,
    AppState,
};
use tower::util::ServiceExt;

pub const EMAIL: &str = "ann@example.com";
pub const USERNAME: &str = "ann1";
pub const PASSWORD: &str = "correct-horse-battery";
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64)";
pub const HOME_IP: &str = "203.0.113.10";
pub const SESSION_COOKIE: &str = "sid";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const SESSION_TTL_SECONDS: i64 = 86_400;
pub const STEP_UP_TTL_SECONDS: i64 = 300;

pub fn test_settings() -> Settings {
    Settings {
        environment: Environment::Dev,
        service_name: "session-service-test".to_string(),
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8080,
            trust_forwarded_headers: true,
        },
        logging: LoggingSettings::default(),
        mongodb: MongoSettings {
            uri: Secret::new("mongodb://unused".to_string()),
            database: "unused".to_string(),
        },
        postgres: PostgresSettings {
            url: Secret::new("postgres://unused".to_string()),
            pool_max: 1,
        },
        session: SessionSettings {
            ttl_seconds: SESSION_TTL_SECONDS,
            cookie_name: SESSION_COOKIE.to_string(),
            store_timeout_ms: 500,
        },
        cookie: CookieSettings::default(),
        csrf: CsrfSettings::default(),
        step_up: StepUpSettings {
            ttl_seconds: STEP_UP_TTL_SECONDS,
            signing_key: Secret::new("test-signing-key".to_string()),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub sessions: Arc<MemorySessionStore>,
    pub account_id: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    /// `name -> (value, attributes)` of every `Set-Cookie` header.
    pub fn set_cookies(&self) -> HashMap<String, (String, String)> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|raw| {
                let (pair, attributes) = raw.split_once(';').unwrap_or((raw, ""));
                let (name, value) = pair.split_once('=')?;
                Some((
                    name.trim().to_string(),
                    (value.trim().to_string(), attributes.to_string()),
                ))
            })
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Cookie and header state of one client.
#[derive(Debug, Clone)]
pub struct Browser {
    pub user_agent: String,
    pub ip: String,
    pub session_id: Option<String>,
    pub csrf: Option<String>,
}

impl Browser {
    pub fn new(ip: &str) -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            ip: ip.to_string(),
            session_id: None,
            csrf: None,
        }
    }

    pub fn request(&self, method: Method, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, &self.user_agent)
            .header("x-forwarded-for", &self.ip);

        let mut cookies = Vec::new();
        if let Some(sid) = &self.session_id {
            cookies.push(format!("{}={}", SESSION_COOKIE, sid));
        }
        if let Some(csrf) = &self.csrf {
            cookies.push(format!("{}={}", CSRF_COOKIE, csrf));
            builder = builder.header(CSRF_HEADER, csrf);
        }
        if !cookies.is_empty() {
            builder = builder.header(header::COOKIE, cookies.join("; "));
        }

        builder
    }

    /// Picks up rotated cookies the way a browser would.
    pub fn absorb(&mut self, response: &TestResponse) {
        let cookies = response.set_cookies();
        if let Some((value, _)) = cookies.get(SESSION_COOKIE) {
            self.session_id = (!value.is_empty()).then(|| value.clone());
        }
        if let Some((value, _)) = cookies.get(CSRF_COOKIE) {
            self.csrf = Some(value.clone());
        }
    }
}

impl TestApp {
    /// App with one registered account.
    pub async fn spawn() -> Self {
        let clock = Arc::new(ManualClock::default());
        let sessions = Arc::new(MemorySessionStore::new(clock.clone()));
        let credentials = Arc::new(MemoryCredentialStore::new());

        let state = AppState::new(
            test_settings(),
            sessions.clone(),
            credentials.clone(),
            credentials,
            clock.clone(),
        )
        .expect("Failed to build app state");

        let account = state
            .accounts
            .register(NewAccount {
                email: EMAIL.to_string(),
                username: USERNAME.to_string(),
                password: Password::new(PASSWORD),
            })
            .await
            .expect("Failed to seed account");

        Self {
            router: build_router(state.clone()),
            state,
            clock,
            sessions,
            account_id: account.id,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn send_json(
        &self,
        builder: axum::http::request::Builder,
        body: serde_json::Value,
    ) -> TestResponse {
        self.send(
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send_empty(&self, builder: axum::http::request::Builder) -> TestResponse {
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn try_login(&self, browser: &Browser, email: &str, password: &str) -> TestResponse {
        self.send_json(
            browser.request(Method::POST, "/v1/auth/login"),
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Logs in the seeded account from `ip` and returns the resulting browser.
    pub async fn login_from(&self, ip: &str) -> Browser {
        let mut browser = Browser::new(ip);
        let response = self.try_login(&browser, EMAIL, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        browser.absorb(&response);
        browser
    }

    pub async fn step_up_token(&self, browser: &mut Browser) -> String {
        let response = self
            .send_json(
                browser.request(Method::POST, "/v1/auth/token"),
                serde_json::json!({ "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "token failed: {}", response.body);
        browser.absorb(&response);
        response.body["token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }
}
