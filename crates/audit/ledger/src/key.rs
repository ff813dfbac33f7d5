use std::fmt;

use maple_crypto::content_key;

/// Logical ledger key: a namespace plus a caller-facing identifier.
///
/// The backend never sees the raw identifier; [`LedgerKey::storage_key`]
/// derives a fixed-shape key from it so any id is safe on every backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    namespace: &'static str,
    id: String,
}

impl LedgerKey {
    pub fn new(namespace: &'static str, id: impl Into<String>) -> Self {
        Self {
            namespace,
            id: id.into(),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn storage_key(&self) -> String {
        content_key(self.namespace, &self.id)
    }

    /// Prefix shared by every storage key in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}/", namespace)
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}
