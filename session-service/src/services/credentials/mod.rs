//! Account lookup and password verification.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;

use super::store::StoreError;
use crate::models::Account;
use crate::utils::{self, Password};

/// Read side used by login and step-up issuance.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// `Ok(false)` on mismatch. Errors are reserved for collaborator failures.
    async fn verify_password(
        &self,
        account: &Account,
        password: &Password,
    ) -> Result<bool, StoreError> {
        verify_blocking(account, password).await
    }
}

/// Write side used by registration.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the email or username is taken.
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;
}

/// Argon2 verification is CPU-bound; keep it off the async workers.
async fn verify_blocking(account: &Account, password: &Password) -> Result<bool, StoreError> {
    let hash = account.password_hash.clone();
    let password = password.clone();

    tokio::task::spawn_blocking(move || utils::verify_password(&password, &hash))
        .await
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("password verification task failed: {}", e)))?
        .map_err(StoreError::Backend)
}
