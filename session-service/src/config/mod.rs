use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config::{self as core_config, Environment};
use service_core::error::AppError;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    pub mongodb: MongoSettings,
    pub postgres: PostgresSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub csrf: CsrfSettings,
    pub step_up: StepUpSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Take the client IP from the first `X-Forwarded-For` hop instead of the
    /// socket peer. Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresSettings {
    pub url: Secret<String>,
    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub ttl_seconds: i64,
    #[serde(default = "default_session_cookie")]
    pub cookie_name: String,
    /// Upper bound for any single store round-trip made on behalf of a request.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl SessionSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

/// Attributes shared by every cookie the service sets.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CookieSettings {
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub secure: bool,
    /// Applies to the session cookie. The CSRF cookie is never HttpOnly.
    #[serde(default = "default_true")]
    pub http_only: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: default_cookie_path(),
            domain: None,
            secure: true,
            http_only: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CsrfSettings {
    #[serde(default = "default_csrf_ttl")]
    pub ttl_seconds: i64,
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,
    #[serde(default = "default_csrf_header")]
    pub header_name: String,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_csrf_ttl(),
            cookie_name: default_csrf_cookie(),
            header_name: default_csrf_header(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepUpSettings {
    pub ttl_seconds: i64,
    pub signing_key: Secret<String>,
}

impl StepUpSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds)
    }
}

fn default_service_name() -> String {
    "session-service".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pool_max() -> u32 {
    10
}

fn default_session_cookie() -> String {
    "sid".to_string()
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_cookie_path() -> String {
    "/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_csrf_ttl() -> i64 {
    3600
}

fn default_csrf_cookie() -> String {
    "csrf_token".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRF-Token".to_string()
}

impl Settings {
    /// Reads `config/base.yaml` (relative to the crate or the workspace root)
    /// and `APP__*` overrides, then validates.
    pub fn load() -> Result<Self, AppError> {
        let base_path = std::env::current_dir()?;

        let configuration_directory: PathBuf = if base_path.ends_with("session-service") {
            base_path.join("config")
        } else {
            base_path.join("session-service").join("config")
        };

        let settings: Settings = core_config::load(&configuration_directory)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.port == 0 {
            return Err(config_error("server.port must be greater than 0"));
        }

        if self.session.ttl_seconds <= 0 {
            return Err(config_error("session.ttl_seconds must be positive"));
        }

        if self.session.store_timeout_ms == 0 {
            return Err(config_error("session.store_timeout_ms must be positive"));
        }

        if self.csrf.ttl_seconds <= 0 {
            return Err(config_error("csrf.ttl_seconds must be positive"));
        }

        if self.step_up.ttl_seconds <= 0 {
            return Err(config_error("step_up.ttl_seconds must be positive"));
        }

        if self.step_up.signing_key.expose_secret().is_empty() {
            return Err(config_error("step_up.signing_key must be set"));
        }

        let names = [
            ("session.cookie_name", &self.session.cookie_name),
            ("csrf.cookie_name", &self.csrf.cookie_name),
            ("csrf.header_name", &self.csrf.header_name),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(config_error(&format!("{} must not be empty", key)));
            }
        }

        if self.csrf.cookie_name == self.session.cookie_name {
            return Err(config_error(
                "csrf.cookie_name and session.cookie_name must differ",
            ));
        }

        if self.environment == Environment::Prod && !self.cookie.secure {
            return Err(config_error("cookie.secure must be enabled in production"));
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}
