use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::file::FileWormStore;
use crate::key::LedgerKey;
use crate::memory::InMemoryWormStore;
use crate::traits::WormStore;
use crate::{LedgerError, LedgerResult};

/// Typed facade over a [`WormStore`].
///
/// Callers address records by [`LedgerKey`]; the facade derives the storage
/// key, serialises values as JSON and reports errors against the readable
/// `namespace:id` form. Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct WormLedger {
    store: Arc<dyn WormStore>,
}

impl WormLedger {
    pub fn with_store(store: Arc<dyn WormStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryWormStore::new()))
    }

    pub fn file_backed(dir: impl Into<PathBuf>) -> LedgerResult<Self> {
        Ok(Self::with_store(Arc::new(FileWormStore::open(dir)?)))
    }

    pub fn store(&self) -> &Arc<dyn WormStore> {
        &self.store
    }

    pub async fn put_raw(&self, key: &LedgerKey, value: Vec<u8>) -> LedgerResult<()> {
        let label = key.to_string();
        match self.store.put(&key.storage_key(), value).await {
            Ok(()) => {
                debug!(key = %label, "ledger put");
                Ok(())
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(key = %label, "ledger put rejected: key exists");
                }
                Err(e.relabel(&label))
            }
        }
    }

    pub async fn get_raw(&self, key: &LedgerKey) -> LedgerResult<Vec<u8>> {
        self.store
            .get(&key.storage_key())
            .await
            .map_err(|e| e.relabel(&key.to_string()))
    }

    pub async fn contains(&self, key: &LedgerKey) -> LedgerResult<bool> {
        self.store.contains(&key.storage_key()).await
    }

    pub async fn put_json<T: Serialize>(&self, key: &LedgerKey, value: &T) -> LedgerResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.put_raw(key, bytes).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &LedgerKey) -> LedgerResult<T> {
        let bytes = self.get_raw(key).await?;
        decode(&bytes)
    }

    /// Like [`WormLedger::get_json`] but maps `NotFound` to `None`.
    pub async fn try_get_json<T: DeserializeOwned>(
        &self,
        key: &LedgerKey,
    ) -> LedgerResult<Option<T>> {
        match self.get_json(key).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every value in `namespace`, in storage-key order.
    pub async fn list_json<T: DeserializeOwned>(&self, namespace: &str) -> LedgerResult<Vec<T>> {
        let prefix = LedgerKey::namespace_prefix(namespace);
        let keys = self.store.keys_with_prefix(&prefix).await?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self.store.get(&key).await?;
            values.push(decode(&bytes)?);
        }
        Ok(values)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> LedgerResult<T> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
}

impl std::fmt::Debug for WormLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WormLedger").finish_non_exhaustive()
    }
}
