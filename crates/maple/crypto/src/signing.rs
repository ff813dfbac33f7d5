use std::fmt;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;
use zeroize::Zeroizing;

use crate::digest::Digest;
use crate::error::{decode_fixed, CryptoError};

const SECRET_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

/// Detached Ed25519 signature, serialized as hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes([u8; SIGNATURE_LEN]);

impl SignatureBytes {
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        decode_fixed::<SIGNATURE_LEN>("signature", encoded).map(Self)
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        SignatureBytes::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Distributable half of a signing identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_fixed::<32>("public key", encoded)?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Stable short identifier for this key (first 8 bytes of its BLAKE3 hash).
    pub fn key_id(&self) -> String {
        Digest::hash(&self.0).short()
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.key_id())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PublicKey::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// The one holder of a signing identity's private key.
///
/// Provisioned once at process start and shared behind an `Arc`; the key is
/// never mutated and is zeroized when the last handle is dropped. Nothing on
/// this type hands the secret back out.
pub struct ReceiptSigner {
    key: SigningKey,
    public: PublicKey,
}

impl ReceiptSigner {
    /// Generate a fresh, process-local identity.
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
        OsRng.fill_bytes(&mut *secret);
        Self::from_secret(&secret)
    }

    /// Build a signer from a hex-encoded 32-byte Ed25519 secret.
    pub fn from_secret_hex(encoded: &str) -> Result<Self, CryptoError> {
        let secret = Zeroizing::new(decode_fixed::<SECRET_LEN>("signing key", encoded)?);
        Ok(Self::from_secret(&secret))
    }

    /// Load a hex-encoded secret from `path`. The file buffer is wiped after use.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            CryptoError::KeyUnavailable(format!("{}: {}", path.display(), e))
        })?);
        let signer = Self::from_secret_hex(&contents)?;
        info!(key_id = %signer.key_id(), "Signing key loaded");
        Ok(signer)
    }

    fn from_secret(secret: &[u8; SECRET_LEN]) -> Self {
        let key = SigningKey::from_bytes(secret);
        let public = PublicKey::from(&key.verifying_key());
        Self { key, public }
    }

    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.key.sign(message).to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn key_id(&self) -> String {
        self.public.key_id()
    }

    /// Write this identity's secret to `path` for later [`ReceiptSigner::load`].
    ///
    /// Used by provisioning tooling only; refuses to overwrite an existing file.
    pub fn write_secret(&self, path: impl AsRef<Path>) -> Result<(), CryptoError> {
        use std::io::Write;

        let secret = Zeroizing::new(self.key.to_bytes());
        let encoded = Zeroizing::new(hex::encode(&*secret));
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl fmt::Debug for ReceiptSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptSigner")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

/// Check `signature` over `message` with `key`. Never panics; any malformed
/// input is simply `false`.
pub fn verify_signature(message: &[u8], signature: &SignatureBytes, key: &VerifyingKey) -> bool {
    let signature = Signature::from_bytes(signature.as_bytes());
    key.verify_strict(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sign_and_verify() {
        let signer = ReceiptSigner::generate();
        let sig = signer.sign(b"receipt bytes");
        assert!(verify_signature(b"receipt bytes", &sig, &signer.verifying_key()));
        assert!(!verify_signature(b"receipt bytez", &sig, &signer.verifying_key()));
    }

    #[test]
    fn wrong_key_rejects() {
        let a = ReceiptSigner::generate();
        let b = ReceiptSigner::generate();
        let sig = a.sign(b"msg");
        assert!(!verify_signature(b"msg", &sig, &b.verifying_key()));
    }

    #[test]
    fn secret_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signer.key");
        let signer = ReceiptSigner::generate();
        signer.write_secret(&path).unwrap();

        let loaded = ReceiptSigner::load(&path).unwrap();
        assert_eq!(loaded.public_key(), signer.public_key());

        // Provisioning never clobbers an existing key file.
        assert!(signer.write_secret(&path).is_err());
    }

    #[test]
    fn missing_key_file_is_unavailable() {
        let err = ReceiptSigner::load("/nonexistent/maple/signer.key").unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnavailable(_)));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let signer = ReceiptSigner::generate();
        let rendered = format!("{:?}", signer);
        assert!(rendered.contains(&signer.key_id()));
        assert!(!rendered.contains(&hex::encode(signer.key.to_bytes())));
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let signer = ReceiptSigner::generate();
        let pk = PublicKey::from_hex(&signer.public_key().to_hex()).unwrap();
        assert_eq!(pk.verifying_key().unwrap(), signer.verifying_key());
    }

    proptest! {
        #[test]
        fn any_bit_flip_breaks_signature(
            message in proptest::collection::vec(any::<u8>(), 1..128),
            index in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let signer = ReceiptSigner::generate();
            let sig = signer.sign(&message);
            let mut tampered = message.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert!(!verify_signature(&tampered, &sig, &signer.verifying_key()));
        }
    }
}
