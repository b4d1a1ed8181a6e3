use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;
use tracing::instrument;

use super::store::{with_deadline, SessionStore, StoreError};
use crate::clock::Clock;
use crate::models::{Device, Session};
use crate::utils::random_token;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("the current session cannot be terminated this way")]
    CannotTerminateCurrent,

    #[error("session could not be created: {0}")]
    Creation(anyhow::Error),

    #[error("session store did not answer in time")]
    Timeout,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(_) => SessionError::Timeout,
            other => SessionError::Store(other),
        }
    }
}

/// Creates, reads and revokes sessions. Records are never mutated.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    store_timeout: StdDuration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        store_timeout: StdDuration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            store_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create(
        &self,
        account_id: &str,
        provider: &str,
        device: Device,
    ) -> Result<Session, SessionError> {
        self.create_with_ttl(account_id, provider, device, self.ttl)
            .await
    }

    #[instrument(skip_all, fields(op = "session.create", account_id = %account_id))]
    pub async fn create_with_ttl(
        &self,
        account_id: &str,
        provider: &str,
        device: Device,
        ttl: Duration,
    ) -> Result<Session, SessionError> {
        let id = random_token().map_err(SessionError::Creation)?;
        let session = Session::new(id, account_id, provider, device, ttl, self.clock.now());

        with_deadline(self.store_timeout, self.store.put(&session))
            .await
            .map_err(|e| match e {
                StoreError::Timeout(_) => SessionError::Timeout,
                other => SessionError::Creation(anyhow::Error::new(other)),
            })?;

        tracing::info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Absent and expired sessions are both `NotFound`.
    #[instrument(skip_all, fields(op = "session.get"))]
    pub async fn get(&self, session_id: &str) -> Result<Session, SessionError> {
        let found = with_deadline(self.store_timeout, self.store.get(session_id)).await?;

        match found {
            Some(session) if !session.is_expired_at(self.clock.now()) => Ok(session),
            _ => Err(SessionError::NotFound),
        }
    }

    /// Revokes another session of `account_id`. A target that is absent or
    /// belongs to someone else is left alone and still reported as success.
    #[instrument(skip_all, fields(op = "session.terminate", account_id = %account_id))]
    pub async fn terminate(
        &self,
        account_id: &str,
        current_session_id: &str,
        target_session_id: &str,
    ) -> Result<(), SessionError> {
        if current_session_id == target_session_id {
            return Err(SessionError::CannotTerminateCurrent);
        }

        let removed = with_deadline(
            self.store_timeout,
            self.store.delete_owned(account_id, target_session_id),
        )
        .await?;

        if removed {
            tracing::info!("Session terminated");
        } else {
            tracing::debug!("No session of this account to terminate");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(op = "session.terminate_all", account_id = %account_id))]
    pub async fn terminate_all(
        &self,
        account_id: &str,
        except_session_id: &str,
    ) -> Result<u64, SessionError> {
        let removed = with_deadline(
            self.store_timeout,
            self.store.delete_all_except(account_id, except_session_id),
        )
        .await?;

        tracing::info!(removed = removed, "Other sessions terminated");
        Ok(removed)
    }

    #[instrument(skip_all, fields(op = "session.list", account_id = %account_id))]
    pub async fn list(&self, account_id: &str) -> Result<Vec<Session>, SessionError> {
        let now = self.clock.now();
        let sessions =
            with_deadline(self.store_timeout, self.store.find_all_by_account(account_id)).await?;

        Ok(sessions
            .into_iter()
            .filter(|s| !s.is_expired_at(now))
            .collect())
    }

    /// Self-termination; only logout calls this.
    #[instrument(skip_all, fields(op = "session.end"))]
    pub async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        with_deadline(self.store_timeout, self.store.delete(session_id)).await?;
        tracing::info!("Session ended");
        Ok(())
    }
}
