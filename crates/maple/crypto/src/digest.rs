use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{decode_fixed, CryptoError};

/// Length in bytes of every digest produced by this crate.
pub const DIGEST_LEN: usize = 32;

/// Versioned hash algorithms understood by the commitment engine.
///
/// Ids are persisted inside commitments; an id this enum does not know
/// is never treated as a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// BLAKE3 with 256-bit output, salt prepended to the payload.
    Blake3V1,
}

impl HashAlgorithm {
    pub const BLAKE3_V1_ID: &'static str = "blake3-256/v1";

    pub fn id(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3V1 => Self::BLAKE3_V1_ID,
        }
    }

    /// Resolve a persisted algorithm id. Returns `None` for anything unrecognised.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            Self::BLAKE3_V1_ID => Some(HashAlgorithm::Blake3V1),
            _ => None,
        }
    }

    /// Like [`HashAlgorithm::from_id`] but for configuration paths, where an
    /// unknown id is an error rather than a failed verification.
    pub fn parse(id: &str) -> Result<Self, CryptoError> {
        Self::from_id(id).ok_or_else(|| CryptoError::UnknownAlgorithm(id.to_string()))
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Blake3V1
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A 256-bit digest.
///
/// Equality is constant-time (delegates to `blake3::Hash`). Serialized as
/// lowercase hex.
#[derive(Clone, Copy)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Plain BLAKE3 of `data`, no salt and no domain tag.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        decode_fixed::<DIGEST_LEN>("digest", encoded).map(Self)
    }

    /// Short display form (first 8 bytes hex).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(other.0)
    }
}

impl Eq for Digest {}

impl Hash for Digest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Digest::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Derive the storage key for an identifier within a namespace.
///
/// The key is `<namespace>/<blake3(namespace || 0x00 || id) hex>`, which keeps
/// arbitrary caller-chosen ids safe to use as file names while staying stable
/// across processes.
pub fn content_key(namespace: &str, id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(&[0]);
    hasher.update(id.as_bytes());
    format!("{}/{}", namespace, hasher.finalize().to_hex())
}
