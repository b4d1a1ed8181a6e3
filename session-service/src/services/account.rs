use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::credentials::{AccountRepository, CredentialStore};
use super::store::{with_deadline, StoreError};
use crate::clock::Clock;
use crate::models::{Account, AccountProfile};
use crate::utils::{hash_password, Password};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account already exists")]
    AlreadyExists,

    #[error("account not found")]
    NotFound,

    #[error("password hashing failed: {0}")]
    Hashing(anyhow::Error),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AccountError::AlreadyExists,
            other => AccountError::Store(other),
        }
    }
}

pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: Password,
}

/// Registration and profile lookup.
#[derive(Clone)]
pub struct AccountService {
    credentials: Arc<dyn CredentialStore>,
    repository: Arc<dyn AccountRepository>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl AccountService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        repository: Arc<dyn AccountRepository>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            repository,
            clock,
            store_timeout,
        }
    }

    #[instrument(skip_all, fields(op = "account.register"))]
    pub async fn register(&self, new: NewAccount) -> Result<Account, AccountError> {
        let password = new.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AccountError::Hashing(anyhow::anyhow!("hashing task failed: {}", e)))?
            .map_err(AccountError::Hashing)?;

        let now = self.clock.now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            username: new.username,
            password_hash,
            created_at: now,
            updated_at: now,
        };

        with_deadline(self.store_timeout, self.repository.insert(&account)).await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    #[instrument(skip_all, fields(op = "account.profile", account_id = %account_id))]
    pub async fn profile(&self, account_id: &str) -> Result<AccountProfile, AccountError> {
        let account = with_deadline(self.store_timeout, self.credentials.find_by_id(account_id))
            .await?
            .ok_or(AccountError::NotFound)?;
        Ok(account.profile())
    }
}
