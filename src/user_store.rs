use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use blob_store::BlobStorage;
use futures::stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const USERS_PREFIX: &str = "users/";

/// A stored user record. Passwords are kept verbatim and compared
/// verbatim at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    // The caller does its own existence check before inserting; concurrent
    // inserts for the same email are last-writer-wins.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<UserRecord>;
}

/// Stores one JSON document per user in the blob store, keyed by the
/// URL-safe base64 of the email so lookups are a single keyed read.
pub struct BlobUserStore {
    storage: Arc<BlobStorage>,
}

impl BlobUserStore {
    pub fn new(storage: Arc<BlobStorage>) -> Self {
        Self { storage }
    }

    fn user_key(email: &str) -> String {
        format!("{}{}.json", USERS_PREFIX, URL_SAFE_NO_PAD.encode(email))
    }
}

#[async_trait]
impl UserStore for BlobUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let key = Self::user_key(email);
        if !self.storage.exists(&key).await? {
            return Ok(None);
        }
        let bytes = self.storage.read_bytes(&key).await?;
        let record: UserRecord =
            serde_json::from_slice(&bytes).context("corrupt user record")?;
        Ok(Some(record))
    }

    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<UserRecord> {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let bytes = serde_json::to_vec(&record)?;
        self.storage
            .put(
                &Self::user_key(email),
                stream::iter(vec![Ok(bytes.into())]),
            )
            .await?;
        Ok(record)
    }
}
