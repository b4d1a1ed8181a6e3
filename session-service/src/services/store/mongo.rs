use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use super::{SessionStore, StoreError};
use crate::clock::Clock;
use crate::models::{Device, Session};

const COLLECTION: &str = "session";
const DUPLICATE_KEY: i32 = 11000;

/// Stored shape of a session. Field names are camelCase on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    account_id: String,
    provider: String,
    user_agent: String,
    ip: String,
    ttl: i64,
    expires_at: BsonDateTime,
    created_at: BsonDateTime,
}

impl From<&Session> for SessionDocument {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            account_id: session.account_id.clone(),
            provider: session.provider.clone(),
            user_agent: session.device.user_agent.clone(),
            ip: session.device.ip.clone(),
            ttl: session.ttl_seconds,
            expires_at: BsonDateTime::from_chrono(session.expires_at),
            created_at: BsonDateTime::from_chrono(session.created_at),
        }
    }
}

impl From<SessionDocument> for Session {
    fn from(doc: SessionDocument) -> Self {
        Self {
            id: doc.id,
            account_id: doc.account_id,
            provider: doc.provider,
            device: Device {
                user_agent: doc.user_agent,
                ip: doc.ip,
            },
            ttl_seconds: doc.ttl,
            expires_at: doc.expires_at.to_chrono(),
            created_at: doc.created_at.to_chrono(),
        }
    }
}

/// MongoDB-backed store. A TTL index on `expiresAt` lets the server purge
/// records; reads also filter on `expiresAt > now` since the purge lags.
#[derive(Clone)]
pub struct MongoSessionStore {
    sessions: Collection<SessionDocument>,
    clock: Arc<dyn Clock>,
}

impl MongoSessionStore {
    pub async fn connect(uri: &str, database: &str, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");

        Ok(Self {
            sessions: db.collection(COLLECTION),
            clock,
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for session-service");

        // Server-side expiry
        let expires_index = IndexModel::builder()
            .keys(doc! { "expiresAt": 1 })
            .options(
                IndexOptions::builder()
                    .name("expires_at_ttl_idx".to_string())
                    .expire_after(std::time::Duration::from_secs(0))
                    .build(),
            )
            .build();

        self.sessions
            .create_index(expires_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create expiresAt TTL index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let account_index = IndexModel::builder()
            .keys(doc! { "accountId": 1 })
            .options(
                IndexOptions::builder()
                    .name("account_id_idx".to_string())
                    .build(),
            )
            .build();

        self.sessions
            .create_index(account_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create accountId index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("MongoDB indexes created");
        Ok(())
    }

    fn now(&self) -> BsonDateTime {
        BsonDateTime::from_chrono(self.clock.now())
    }
}

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        *e.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .insert_one(SessionDocument::from(session), None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::Duplicate
                } else {
                    backend(e)
                }
            })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let found = self
            .sessions
            .find_one(doc! { "_id": id, "expiresAt": { "$gt": self.now() } }, None)
            .await
            .map_err(backend)?;
        Ok(found.map(Session::from))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete_owned(&self, account_id: &str, id: &str) -> Result<bool, StoreError> {
        let result = self
            .sessions
            .delete_one(doc! { "_id": id, "accountId": account_id }, None)
            .await
            .map_err(backend)?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_all_except(&self, account_id: &str, keep_id: &str) -> Result<u64, StoreError> {
        let result = self
            .sessions
            .delete_many(
                doc! { "accountId": account_id, "_id": { "$ne": keep_id } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(result.deleted_count)
    }

    async fn find_all_by_account(&self, account_id: &str) -> Result<Vec<Session>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .build();

        let cursor = self
            .sessions
            .find(
                doc! { "accountId": account_id, "expiresAt": { "$gt": self.now() } },
                options,
            )
            .await
            .map_err(backend)?;

        let docs: Vec<SessionDocument> = cursor.try_collect().await.map_err(backend)?;
        Ok(docs.into_iter().map(Session::from).collect())
    }
}
