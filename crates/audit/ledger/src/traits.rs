use async_trait::async_trait;

use crate::LedgerResult;

/// Storage boundary for write-once values.
///
/// Implementations must make `put` an atomic "write only if absent": of any
/// number of concurrent `put`s to one key exactly one succeeds and the rest
/// fail with [`crate::LedgerError::Conflict`]. A successful `put` is durable
/// for the backend's notion of durability before it returns.
#[async_trait]
pub trait WormStore: Send + Sync {
    /// Store `value` under `key`. Fails with `Conflict` if `key` exists.
    async fn put(&self, key: &str, value: Vec<u8>) -> LedgerResult<()>;

    /// Read the value stored under `key`, or `NotFound`.
    async fn get(&self, key: &str) -> LedgerResult<Vec<u8>>;

    /// Whether `key` holds a value.
    async fn contains(&self, key: &str) -> LedgerResult<bool>;

    /// All keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> LedgerResult<Vec<String>>;
}
