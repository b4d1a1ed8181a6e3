use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{SessionStore, StoreError};
use crate::clock::Clock;
use crate::models::Session;

/// In-process store for tests and single-node development.
///
/// Expired records are filtered on read and purged lazily.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of records held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let now = self.clock.now();
        let found = self.sessions.get(id).map(|entry| entry.value().clone());

        match found {
            Some(session) if session.is_expired_at(now) => {
                self.sessions.remove_if(id, |_, s| s.is_expired_at(now));
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn delete_owned(&self, account_id: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .sessions
            .remove_if(id, |_, session| session.account_id == account_id)
            .is_some())
    }

    async fn delete_all_except(&self, account_id: &str, keep_id: &str) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        self.sessions.retain(|id, session| {
            let drop = session.account_id == account_id && id != keep_id;
            if drop {
                removed += 1;
            }
            !drop
        });
        Ok(removed)
    }

    async fn find_all_by_account(&self, account_id: &str) -> Result<Vec<Session>, StoreError> {
        let now = self.clock.now();
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.account_id == account_id && !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
