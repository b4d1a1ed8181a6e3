use async_trait::async_trait;

use super::{BoundSession, Gate, GateRejection, GateRequest, RequestContext, Stage};
use crate::services::{SessionError, SessionManager};

const GATE: &str = "session";

/// Resolves the session cookie and checks the caller's device against the
/// one captured at login. A mismatch rejects the request but leaves the
/// session in place.
pub struct SessionGate {
    sessions: SessionManager,
    cookie_name: String,
}

impl SessionGate {
    pub fn new(sessions: SessionManager, cookie_name: impl Into<String>) -> Self {
        Self {
            sessions,
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait]
impl Gate for SessionGate {
    fn name(&self) -> &'static str {
        GATE
    }

    fn stage(&self) -> Stage {
        Stage::Session
    }

    async fn admit(
        &self,
        request: &GateRequest,
        ctx: &mut RequestContext,
    ) -> Result<(), GateRejection> {
        let session_id = request
            .cookie(&self.cookie_name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GateRejection::unauthorized(GATE, "session cookie missing"))?;

        let session = self.sessions.get(session_id).await.map_err(|e| match e {
            SessionError::NotFound => GateRejection::forbidden(GATE, "session not found"),
            SessionError::Timeout => GateRejection::forbidden(GATE, "session store timed out"),
            other => GateRejection::internal(GATE, format!("session lookup failed: {}", other)),
        })?;

        if &session.device != request.device() {
            tracing::warn!(
                session_id = %session.id,
                account_id = %session.account_id,
                "Device fingerprint does not match session"
            );
            return Err(GateRejection::forbidden(GATE, "device mismatch"));
        }

        ctx.session = Some(BoundSession {
            account_id: session.account_id,
            session_id: session.id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gate::Rejection;
    use crate::models::{Device, PASSWORD_PROVIDER};
    use crate::models::Session;
    use crate::services::{MemorySessionStore, SessionStore, StoreError};
    use chrono::Duration;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn manager() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let manager = SessionManager::new(
            Arc::new(MemorySessionStore::new(clock.clone())),
            clock.clone(),
            Duration::hours(1),
            StdDuration::from_secs(1),
        );
        (manager, clock)
    }

    fn login_device() -> Device {
        Device::new("Mozilla/5.0", "192.0.2.10")
    }

    #[tokio::test]
    async fn binds_session_for_matching_device() {
        let (manager, _) = manager();
        let session = manager
            .create("acc", PASSWORD_PROVIDER, login_device())
            .await
            .unwrap();
        let gate = SessionGate::new(manager, "sid");
        let mut ctx = RequestContext::default();

        gate.admit(
            &GateRequest::new(login_device()).with_cookie("sid", session.id.clone()),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(
            ctx.session,
            Some(BoundSession {
                account_id: "acc".to_string(),
                session_id: session.id,
            })
        );
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthorized() {
        let (manager, _) = manager();
        let gate = SessionGate::new(manager, "sid");

        let rejection = gate
            .admit(&GateRequest::new(login_device()), &mut RequestContext::default())
            .await
            .unwrap_err();

        assert_eq!(rejection.kind, Rejection::Unauthorized);
    }

    #[tokio::test]
    async fn unknown_or_expired_session_is_forbidden() {
        let (manager, clock) = manager();
        let session = manager
            .create("acc", PASSWORD_PROVIDER, login_device())
            .await
            .unwrap();
        let gate = SessionGate::new(manager, "sid");

        let unknown = gate
            .admit(
                &GateRequest::new(login_device()).with_cookie("sid", "nope"),
                &mut RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(unknown.kind, Rejection::Forbidden);

        clock.advance(Duration::hours(1));
        let expired = gate
            .admit(
                &GateRequest::new(login_device()).with_cookie("sid", session.id),
                &mut RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(expired.kind, Rejection::Forbidden);
    }

    #[tokio::test]
    async fn device_mismatch_is_forbidden_and_keeps_session() {
        let (manager, _) = manager();
        let session = manager
            .create("acc", PASSWORD_PROVIDER, login_device())
            .await
            .unwrap();
        let gate = SessionGate::new(manager.clone(), "sid");

        for device in [
            Device::new("Mozilla/5.0", "192.0.2.11"),
            Device::new("curl/8.0", "192.0.2.10"),
        ] {
            let mut ctx = RequestContext::default();
            let rejection = gate
                .admit(
                    &GateRequest::new(device).with_cookie("sid", session.id.clone()),
                    &mut ctx,
                )
                .await
                .unwrap_err();

            assert_eq!(rejection.kind, Rejection::Forbidden);
            assert!(ctx.session.is_none());
        }

        assert!(manager.get(&session.id).await.is_ok());
    }

    struct StalledStore;

    #[async_trait]
    impl SessionStore for StalledStore {
        async fn put(&self, _: &Session) -> Result<(), StoreError> {
            futures::future::pending().await
        }
        async fn get(&self, _: &str) -> Result<Option<Session>, StoreError> {
            futures::future::pending().await
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            futures::future::pending().await
        }
        async fn delete_owned(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            futures::future::pending().await
        }
        async fn delete_all_except(&self, _: &str, _: &str) -> Result<u64, StoreError> {
            futures::future::pending().await
        }
        async fn find_all_by_account(&self, _: &str) -> Result<Vec<Session>, StoreError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_store_fails_closed() {
        let manager = SessionManager::new(
            Arc::new(StalledStore),
            Arc::new(ManualClock::default()),
            Duration::hours(1),
            StdDuration::from_millis(20),
        );
        let gate = SessionGate::new(manager, "sid");
        let mut ctx = RequestContext::default();

        let rejection = gate
            .admit(
                &GateRequest::new(login_device()).with_cookie("sid", "some-session"),
                &mut ctx,
            )
            .await
            .unwrap_err();

        assert_eq!(rejection.kind, Rejection::Forbidden);
        assert!(ctx.session.is_none());
    }
}
