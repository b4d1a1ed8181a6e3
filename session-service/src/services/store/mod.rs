//! Durable session records with store-enforced expiry.

mod memory;
mod mongo;

pub use memory::MemorySessionStore;
pub use mongo::MongoSessionStore;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Session;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("record already exists")]
    Duplicate,

    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Session persistence.
///
/// `get` and `find_all_by_account` never return a record whose `expires_at`
/// has passed, whether or not the backend has purged it yet.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the id is already taken.
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Removes `id` only if it belongs to `account_id`. Returns whether a
    /// record was removed.
    async fn delete_owned(&self, account_id: &str, id: &str) -> Result<bool, StoreError>;

    /// Returns the number of removed sessions.
    async fn delete_all_except(&self, account_id: &str, keep_id: &str) -> Result<u64, StoreError>;

    async fn find_all_by_account(&self, account_id: &str) -> Result<Vec<Session>, StoreError>;
}

/// Bounds a store round-trip. The inner future is dropped on expiry.
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
}
