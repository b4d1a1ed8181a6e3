//! Boundary mapping from service errors to `AppError`.
//!
//! Public messages are fixed strings; the detailed cause is logged by the
//! service that produced it.

use service_core::error::AppError;

use super::account::AccountError;
use super::auth::AuthError;
use super::session::SessionError;
use super::store::StoreError;
use super::token::TokenError;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(_) => AppError::ServiceUnavailable("Storage timeout".to_string()),
            StoreError::Duplicate => AppError::Conflict("Record already exists".to_string()),
            StoreError::Backend(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => AppError::NotFound("Session not found".to_string()),
            SessionError::CannotTerminateCurrent => {
                AppError::BadRequest("Cannot terminate current session".to_string())
            }
            SessionError::Creation(e) => AppError::InternalError(e),
            SessionError::Timeout => AppError::ServiceUnavailable("Storage timeout".to_string()),
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => AppError::Forbidden(anyhow::anyhow!("Invalid access token")),
            other => AppError::InternalError(anyhow::Error::new(other)),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::LoginOrPasswordIncorrect(_) => {
                AppError::AuthError(anyhow::anyhow!("wrong login or password"))
            }
            AuthError::AccountNotFound | AuthError::WrongPassword => {
                AppError::Forbidden(anyhow::anyhow!("wrong password"))
            }
            AuthError::Session(e) => e.into(),
            AuthError::Token(e) => e.into(),
            AuthError::Credentials(e) => e.into(),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::AlreadyExists => AppError::Conflict("Account already exists".to_string()),
            AccountError::NotFound => AppError::NotFound("Account not found".to_string()),
            AccountError::Hashing(e) => AppError::InternalError(e),
            AccountError::Store(e) => e.into(),
        }
    }
}
