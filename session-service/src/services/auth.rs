use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use super::credentials::CredentialStore;
use super::session::{SessionError, SessionManager};
use super::store::{with_deadline, StoreError};
use super::token::{TokenError, TokenSigner};
use crate::models::{Account, Device, Session, PASSWORD_PROVIDER};
use crate::utils::Password;

/// Which check failed during login. Logged, never shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    AccountNotFound,
    WrongPassword,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("wrong login or password")]
    LoginOrPasswordIncorrect(CredentialFailure),

    #[error("account not found")]
    AccountNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("credential store failure: {0}")]
    Credentials(StoreError),
}

/// Login, logout and step-up token issuance.
#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    tokens: TokenSigner,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        sessions: SessionManager,
        tokens: TokenSigner,
        store_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            sessions,
            tokens,
            store_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.tokens
    }

    /// Authenticates by email and password and opens a session for `device`.
    #[instrument(skip_all, fields(op = "auth.login"))]
    pub async fn login(
        &self,
        email: &str,
        password: &Password,
        device: Device,
    ) -> Result<Session, AuthError> {
        let account = match self.find_by_email(email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(reason = "account_not_found", "Login rejected");
                return Err(AuthError::LoginOrPasswordIncorrect(
                    CredentialFailure::AccountNotFound,
                ));
            }
        };

        if !self.check_password(&account, password).await? {
            tracing::warn!(account_id = %account.id, reason = "wrong_password", "Login rejected");
            return Err(AuthError::LoginOrPasswordIncorrect(
                CredentialFailure::WrongPassword,
            ));
        }

        let session = self
            .sessions
            .create(&account.id, PASSWORD_PROVIDER, device)
            .await?;

        tracing::info!(account_id = %account.id, "Login succeeded");
        Ok(session)
    }

    #[instrument(skip_all, fields(op = "auth.logout"))]
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.end(session_id).await?;
        Ok(())
    }

    /// Re-checks the password of an already authenticated account and mints a
    /// step-up token for it.
    #[instrument(skip_all, fields(op = "auth.issue_step_up_token", account_id = %account_id))]
    pub async fn issue_step_up_token(
        &self,
        account_id: &str,
        password: &Password,
    ) -> Result<String, AuthError> {
        let account = with_deadline(self.store_timeout, self.credentials.find_by_id(account_id))
            .await
            .map_err(AuthError::Credentials)?
            .ok_or(AuthError::AccountNotFound)?;

        if !self.check_password(&account, password).await? {
            tracing::warn!("Step-up token refused: wrong password");
            return Err(AuthError::WrongPassword);
        }

        let token = self.tokens.issue(&account.id)?;
        tracing::info!("Step-up token issued");
        Ok(token)
    }

    /// Returns the account id the token was issued to.
    pub fn verify_step_up_token(&self, token: &str) -> Result<String, AuthError> {
        Ok(self.tokens.verify(token)?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        with_deadline(self.store_timeout, self.credentials.find_by_email(email))
            .await
            .map_err(AuthError::Credentials)
    }

    /// Runs outside the store deadline.
    async fn check_password(&self, account: &Account, password: &Password) -> Result<bool, AuthError> {
        self.credentials
            .verify_password(account, password)
            .await
            .map_err(AuthError::Credentials)
    }
}
