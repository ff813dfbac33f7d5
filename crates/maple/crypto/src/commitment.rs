use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::{Digest, HashAlgorithm};
use crate::error::{decode_fixed, CryptoError};

pub const SALT_LEN: usize = 32;

/// Per-commitment random salt.
///
/// Two commitments over the same payload get different salts and therefore
/// different digests, so digests stored in the ledger cannot be correlated
/// against a dictionary of candidate payloads.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        decode_fixed::<SALT_LEN>("salt", encoded).map(Self)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Salt::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Salted digest of an evidence payload. Holds no payload bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub digest: Digest,
    pub salt: Salt,
    pub algorithm_id: String,
}

/// Computes and checks commitments with one fixed algorithm.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitmentEngine {
    algorithm: HashAlgorithm,
}

impl CommitmentEngine {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Build an engine from a configured algorithm id. Unknown ids are a
    /// configuration error.
    pub fn from_algorithm_id(id: &str) -> Result<Self, CryptoError> {
        HashAlgorithm::parse(id).map(Self::new)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Commit to `payload` under a fresh random salt.
    pub fn commit(&self, payload: &[u8]) -> Commitment {
        self.commit_with_salt(payload, Salt::random())
    }

    /// Commit with an explicit salt. Deterministic in `(payload, salt)`.
    pub fn commit_with_salt(&self, payload: &[u8], salt: Salt) -> Commitment {
        Commitment {
            digest: salted_digest(self.algorithm, &salt, payload),
            salt,
            algorithm_id: self.algorithm.id().to_string(),
        }
    }

    /// Recompute the digest of `payload` with the commitment's salt and compare
    /// in constant time.
    ///
    /// Returns `false` when the commitment names an algorithm this engine does
    /// not run, including ids no engine recognises.
    pub fn verify(&self, payload: &[u8], commitment: &Commitment) -> bool {
        match HashAlgorithm::from_id(&commitment.algorithm_id) {
            Some(algorithm) if algorithm == self.algorithm => {
                salted_digest(algorithm, &commitment.salt, payload) == commitment.digest
            }
            _ => false,
        }
    }
}

fn salted_digest(algorithm: HashAlgorithm, salt: &Salt, payload: &[u8]) -> Digest {
    match algorithm {
        HashAlgorithm::Blake3V1 => {
            let mut hasher = blake3::Hasher::new();
            hasher.update(salt.as_bytes());
            hasher.update(payload);
            hasher.finalize().into()
        }
    }
}
