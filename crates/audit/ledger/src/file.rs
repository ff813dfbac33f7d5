//! Durable file-backed WORM store.
//!
//! One file per key under the store directory. A value is written to a temp
//! file in the target directory, synced, then hard-linked into place with
//! `persist_noclobber`; the link fails atomically when the key file already
//! exists, which is the store's write-only-if-absent point.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::traits::WormStore;
use crate::{LedgerError, LedgerResult};

const TEMP_PREFIX: &str = ".worm-";

#[derive(Debug, Clone)]
pub struct FileWormStore {
    dir: PathBuf,
}

impl FileWormStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> LedgerResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> LedgerResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    async fn blocking<T, F>(f: F) -> LedgerResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> LedgerResult<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| LedgerError::Backend(format!("blocking task failed: {}", e)))?
    }
}

/// Keys are `/`-separated segments of `[A-Za-z0-9_.-]`, never `.`/`..`
/// and never starting with the temp-file prefix.
fn validate_key(key: &str) -> LedgerResult<()> {
    if key.is_empty() {
        return Err(LedgerError::InvalidKey("empty key".to_string()));
    }
    for segment in key.split('/') {
        let bad = segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.starts_with(TEMP_PREFIX)
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if bad {
            return Err(LedgerError::InvalidKey(key.to_string()));
        }
    }
    Ok(())
}

fn write_new(path: &Path, value: &[u8]) -> LedgerResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| LedgerError::InvalidKey(path.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)?;
    tmp.write_all(value)?;
    tmp.as_file().sync_all()?;

    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            LedgerError::Conflict {
                key: path.display().to_string(),
            }
        } else {
            LedgerError::Io(e.error)
        }
    })?;

    // Make the new directory entry itself durable.
    fs::File::open(parent)?.sync_all()?;
    Ok(())
}

fn collect_keys(root: &Path, dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(TEMP_PREFIX) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_keys(root, &path, prefix, out)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        if key.starts_with(prefix) {
            out.push(key);
        }
    }
    Ok(())
}

#[async_trait]
impl WormStore for FileWormStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> LedgerResult<()> {
        let path = self.path_for(key)?;
        let key_owned = key.to_string();
        let len = value.len();
        Self::blocking(move || write_new(&path, &value))
            .await
            .map_err(|e| e.relabel(&key_owned))?;
        debug!(key = %key, bytes = len, "worm value persisted");
        Ok(())
    }

    async fn get(&self, key: &str) -> LedgerResult<Vec<u8>> {
        let path = self.path_for(key)?;
        let key_owned = key.to_string();
        Self::blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LedgerError::NotFound { key: key_owned })
            }
            Err(e) => Err(LedgerError::Io(e)),
        })
        .await
    }

    async fn contains(&self, key: &str) -> LedgerResult<bool> {
        let path = self.path_for(key)?;
        Self::blocking(move || Ok(path.is_file())).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> LedgerResult<Vec<String>> {
        let root = self.dir.clone();
        // Only descend into the directory the prefix names.
        let start = match prefix.rfind('/') {
            Some(idx) => root.join(&prefix[..idx]),
            None => root.clone(),
        };
        let prefix = prefix.to_string();
        Self::blocking(move || {
            let mut keys = Vec::new();
            collect_keys(&root, &start, &prefix, &mut keys)?;
            keys.sort();
            Ok(keys)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWormStore::open(dir.path()).unwrap();

        store.put("receipt/abc", b"v1".to_vec()).await.unwrap();
        let err = store.put("receipt/abc", b"v2".to_vec()).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get("receipt/abc").await.unwrap(), b"v1".to_vec());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileWormStore::open(dir.path()).unwrap();
            store.put("anchor/one", b"ds".to_vec()).await.unwrap();
        }
        let reopened = FileWormStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("anchor/one").await.unwrap(), b"ds".to_vec());
        assert!(reopened.contains("anchor/one").await.unwrap());
        assert!(reopened
            .put("anchor/one", b"other".to_vec())
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWormStore::open(dir.path()).unwrap();
        let err = store.get("receipt/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWormStore::open(dir.path()).unwrap();
        for key in ["", "../x", "a//b", "/abs", "a/./b", "ok/.worm-x", "sp ace"] {
            let err = store.put(key, vec![]).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidKey(_)), "key {:?}", key);
        }
    }

    #[tokio::test]
    async fn prefix_listing_skips_other_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWormStore::open(dir.path()).unwrap();
        for key in ["receipt/b", "receipt/a", "batch/a", "receipts/z"] {
            store.put(key, vec![1]).await.unwrap();
        }
        assert_eq!(
            store.keys_with_prefix("receipt/").await.unwrap(),
            vec!["receipt/a".to_string(), "receipt/b".to_string()]
        );
        assert!(store.keys_with_prefix("missing/").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_puts_have_exactly_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileWormStore::open(dir.path()).unwrap());
        let tasks = (0..8u8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.put("batch-member/r1", vec![i]).await })
        });
        let results = futures::future::join_all(tasks).await;
        let ok = results.into_iter().filter(|r| matches!(r, Ok(Ok(())))).count();
        assert_eq!(ok, 1);
    }
}
