use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{AccountRepository, CredentialStore};
use crate::models::Account;
use crate::services::store::StoreError;

/// Accounts keyed by id, for tests and local runs without Postgres.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    accounts: Arc<DashMap<String, Account>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AccountRepository for MemoryCredentialStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let taken = self.accounts.iter().any(|entry| {
            entry.id == account.id
                || entry.email.eq_ignore_ascii_case(&account.email)
                || entry.username == account.username
        });
        if taken {
            return Err(StoreError::Duplicate);
        }

        self.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{hash_password, Password};
    use chrono::Utc;

    fn account(id: &str, email: &str, username: &str, password: &str) -> Account {
        Account {
            id: id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password(&Password::new(password)).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn finds_by_email_case_insensitively() {
        let store = MemoryCredentialStore::new();
        store
            .insert(&account("1", "Ann@Example.com", "ann1", "password1"))
            .await
            .unwrap();

        let found = store.find_by_email("ann@example.com").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some("1".to_string()));
        assert!(store.find_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = MemoryCredentialStore::new();
        store
            .insert(&account("1", "ann@example.com", "ann1", "password1"))
            .await
            .unwrap();

        let dup = store
            .insert(&account("2", "ann@example.com", "ann2", "password1"))
            .await;
        assert!(matches!(dup, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn verifies_password_against_stored_hash() {
        let store = MemoryCredentialStore::new();
        let acc = account("1", "ann@example.com", "ann1", "password1");

        assert!(store
            .verify_password(&acc, &Password::new("password1"))
            .await
            .unwrap());
        assert!(!store
            .verify_password(&acc, &Password::new("password2"))
            .await
            .unwrap());
    }
}
