use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::{read_json, write_json};
use crate::{
    Result,
    types::{CredentialRecord, TokenPair},
};

/// One token pair per user identity.
///
/// Implementations are pure persistence: a write is visible to every later
/// read in the same process, and no implementation inspects expiry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>>;

    /// Inserts the record, or overwrites the existing one for `user_id`.
    async fn upsert(
        &self,
        user_id: &str,
        pair: &TokenPair,
        expires_at: DateTime<Utc>,
    ) -> Result<CredentialRecord>;

    /// Removes the record. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> Result<bool>;
}

fn record(user_id: &str, pair: &TokenPair, expires_at: DateTime<Utc>) -> CredentialRecord {
    CredentialRecord {
        user_id: user_id.to_string(),
        access_token: pair.access_token.clone(),
        refresh_token: pair.refresh_token.clone(),
        scope: pair.scope.clone(),
        expires_at,
        updated_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: &str,
        pair: &TokenPair,
        expires_at: DateTime<Utc>,
    ) -> Result<CredentialRecord> {
        let record = record(user_id, pair, expires_at);
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        Ok(record)
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(user_id).is_some())
    }
}

/// Credential records kept in a single JSON document keyed by user id.
///
/// Every mutation rewrites the document while holding an async mutex, so
/// overlapping requests in one process never lose each other's writes. The
/// document is written through a uniquely named temp file and is readable by
/// the owner only on unix.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Nothing is read or created until the first operation.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use notevibes::{config::Config, management::FileCredentialStore};
    ///
    /// let config = Config::new("client-id", None);
    /// let store = FileCredentialStore::new(config.credentials_path());
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, CredentialRecord>> {
        read_json(&self.path).await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(user_id))
    }

    async fn upsert(
        &self,
        user_id: &str,
        pair: &TokenPair,
        expires_at: DateTime<Utc>,
    ) -> Result<CredentialRecord> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = record(user_id, pair, expires_at);
        records.insert(user_id.to_string(), record.clone());
        write_json(&self.path, &records).await?;
        Ok(record)
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let existed = records.remove(user_id).is_some();
        if existed {
            write_json(&self.path, &records).await?;
        }
        Ok(existed)
    }
}
