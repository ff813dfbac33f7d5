//! MAPLE Crypto — commitment and signing primitives for audit trails.
//!
//! Two concerns live here and nothing else:
//!
//! - **Commitments**: `digest = H(salt || payload)` with a fresh random salt per
//!   commitment and a versioned hash algorithm id. The payload itself is never
//!   retained by a [`Commitment`].
//! - **Signatures**: Ed25519 over caller-supplied canonical bytes. The signing key
//!   is held by a single [`ReceiptSigner`] and never leaves it; auditors only ever
//!   see the [`PublicKey`].
//!
//! Verification is fail-closed: an unknown or mismatched algorithm id, a malformed
//! key, or a malformed signature all verify as `false`.

#![deny(unsafe_code)]

mod commitment;
mod digest;
mod error;
mod signing;

pub use commitment::{Commitment, CommitmentEngine, Salt, SALT_LEN};
pub use digest::{content_key, Digest, HashAlgorithm, DIGEST_LEN};
pub use error::CryptoError;
pub use signing::{verify_signature, PublicKey, ReceiptSigner, SignatureBytes};

// Re-exported so downstream crates can name the key type without a direct dependency.
pub use ed25519_dalek::VerifyingKey;
