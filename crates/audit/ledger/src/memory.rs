//! In-memory WORM store.
//!
//! Deterministic and test-friendly. Values live as long as the store does.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::traits::WormStore;
use crate::{LedgerError, LedgerResult};

#[derive(Default)]
pub struct InMemoryWormStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryWormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WormStore for InMemoryWormStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> LedgerResult<()> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| LedgerError::Backend("worm store lock poisoned".to_string()))?;

        // Check and insert under one write lock: the compare-and-swap point.
        if guard.contains_key(key) {
            return Err(LedgerError::Conflict {
                key: key.to_string(),
            });
        }
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> LedgerResult<Vec<u8>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| LedgerError::Backend("worm store lock poisoned".to_string()))?;
        guard.get(key).cloned().ok_or_else(|| LedgerError::NotFound {
            key: key.to_string(),
        })
    }

    async fn contains(&self, key: &str) -> LedgerResult<bool> {
        let guard = self
            .entries
            .read()
            .map_err(|_| LedgerError::Backend("worm store lock poisoned".to_string()))?;
        Ok(guard.contains_key(key))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> LedgerResult<Vec<String>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| LedgerError::Backend("worm store lock poisoned".to_string()))?;
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn second_put_conflicts_and_first_value_survives() {
        let store = InMemoryWormStore::new();
        store.put("k", b"v1".to_vec()).await.unwrap();

        let err = store.put("k", b"v2".to_vec()).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get("k").await.unwrap(), b"v1".to_vec());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryWormStore::new();
        assert!(store.get("absent").await.unwrap_err().is_not_found());
        assert!(!store.contains("absent").await.unwrap());
    }

    #[tokio::test]
    async fn prefix_scan_is_sorted_and_bounded() {
        let store = InMemoryWormStore::new();
        for key in ["receipt/b", "anchor/a", "receipt/a", "receipts/x"] {
            store.put(key, vec![]).await.unwrap();
        }
        let keys = store.keys_with_prefix("receipt/").await.unwrap();
        assert_eq!(keys, vec!["receipt/a".to_string(), "receipt/b".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_puts_have_exactly_one_winner() {
        let store = Arc::new(InMemoryWormStore::new());
        let tasks = (0..16u8).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put("contended", vec![i]).await })
        });

        let results = futures::future::join_all(tasks).await;
        let winners = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
