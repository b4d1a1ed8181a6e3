//! Session model - one authenticated device/browser instance.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Provider tag for sessions opened with email and password.
pub const PASSWORD_PROVIDER: &str = "password";

/// Client fingerprint captured at login and re-derived on every request.
///
/// Comparison is strict equality on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub user_agent: String,
    pub ip: String,
}

impl Device {
    pub fn new(user_agent: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip: ip.into(),
        }
    }
}

/// Session entity. Never updated in place; it is created, read and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    pub provider: String,
    pub device: Device,
    pub ttl_seconds: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: String,
        account_id: &str,
        provider: &str,
        device: Device,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id: account_id.to_string(),
            provider: provider.to_string(),
            device,
            ttl_seconds: ttl.num_seconds(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Session info for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub provider: String,
    pub user_agent: String,
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionInfo {
    pub fn from_session(session: Session, current_session_id: &str) -> Self {
        let is_current = session.id == current_session_id;
        Self {
            id: session.id,
            provider: session.provider,
            user_agent: session.device.user_agent,
            ip: session.device.ip,
            created_at: session.created_at,
            expires_at: session.expires_at,
            is_current,
        }
    }
}
