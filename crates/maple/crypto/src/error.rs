use thiserror::Error;

/// Errors raised while provisioning keys or decoding cryptographic material.
///
/// Verification never returns these: `verify` style operations answer `false`.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("unknown hash algorithm id: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid hex encoding for {what}: {reason}")]
    InvalidHex { what: &'static str, reason: String },

    #[error("invalid length for {what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("key material unavailable: {0}")]
    KeyUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn decode_fixed<const N: usize>(
    what: &'static str,
    encoded: &str,
) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidHex {
        what,
        reason: e.to_string(),
    })?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        actual,
    })
}
