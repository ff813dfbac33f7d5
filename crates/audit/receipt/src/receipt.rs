use maple_audit_types::{
    rfc3339, AnchorId, EvidenceStrength, OperationId, OperationType, ReceiptId, Timestamp,
};
use maple_crypto::{verify_signature, Commitment, Digest, Salt, SignatureBytes, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::ReceiptError;

const RECEIPT_DOMAIN: &[u8] = b"maple-audit/receipt/v1";

/// The minimal signed record of one operation.
///
/// Immutable once signed: `signature` covers [`Receipt::canonical_bytes`],
/// which includes every other field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: ReceiptId,
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub anchor_id: AnchorId,
    pub committed_at: Timestamp,
    pub input_commitment: Commitment,
    pub output_commitment: Commitment,
    pub evidence_strength: EvidenceStrength,
    pub signature: SignatureBytes,
}

/// Appends `bytes` with a big-endian u32 length prefix.
fn field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn commitment_fields(buf: &mut Vec<u8>, c: &Commitment) {
    field(buf, c.digest.as_bytes());
    field(buf, c.salt.as_bytes());
    field(buf, c.algorithm_id.as_bytes());
}

impl Receipt {
    /// Canonical serialization of every field preceding `signature`.
    ///
    /// Domain-separated and length-prefixed, so no two distinct receipts
    /// share an encoding. Stable across storage formats.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        field(&mut buf, RECEIPT_DOMAIN);
        field(&mut buf, self.receipt_id.as_str().as_bytes());
        field(&mut buf, self.operation_id.as_str().as_bytes());
        field(&mut buf, self.operation_type.as_str().as_bytes());
        field(&mut buf, self.anchor_id.as_str().as_bytes());
        field(&mut buf, rfc3339(&self.committed_at).as_bytes());
        commitment_fields(&mut buf, &self.input_commitment);
        commitment_fields(&mut buf, &self.output_commitment);
        field(&mut buf, self.evidence_strength.as_str().as_bytes());
        buf
    }

    /// Canonical bytes followed by the signature: what a batch leaf hashes.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut buf = self.canonical_bytes();
        field(&mut buf, self.signature.as_bytes());
        buf
    }

    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        verify_signature(&self.canonical_bytes(), &self.signature, key)
    }

    pub fn view(&self) -> ReceiptView {
        ReceiptView::from(self)
    }
}

/// External receipt schema: plain strings, hex digests and a hex signature.
///
/// Carries the commitment salts and algorithm ids as well, so an auditor
/// holding only this view and the public key can check the signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptView {
    pub receipt_id: String,
    pub operation_id: String,
    pub operation_type: OperationType,
    pub anchor_id: String,
    pub committed_at: String,
    pub input_hash: String,
    pub output_hash: String,
    pub evidence_strength: EvidenceStrength,
    pub input_salt: String,
    pub output_salt: String,
    pub input_algorithm_id: String,
    pub output_algorithm_id: String,
    pub signature: String,
}

impl From<&Receipt> for ReceiptView {
    fn from(r: &Receipt) -> Self {
        Self {
            receipt_id: r.receipt_id.to_string(),
            operation_id: r.operation_id.to_string(),
            operation_type: r.operation_type,
            anchor_id: r.anchor_id.to_string(),
            committed_at: rfc3339(&r.committed_at),
            input_hash: r.input_commitment.digest.to_hex(),
            output_hash: r.output_commitment.digest.to_hex(),
            evidence_strength: r.evidence_strength,
            input_salt: r.input_commitment.salt.to_hex(),
            output_salt: r.output_commitment.salt.to_hex(),
            input_algorithm_id: r.input_commitment.algorithm_id.clone(),
            output_algorithm_id: r.output_commitment.algorithm_id.clone(),
            signature: r.signature.to_hex(),
        }
    }
}

impl TryFrom<&ReceiptView> for Receipt {
    type Error = ReceiptError;

    fn try_from(v: &ReceiptView) -> Result<Self, Self::Error> {
        let invalid = |e: maple_crypto::CryptoError| ReceiptError::InvalidView(e.to_string());
        let committed_at = chrono_parse(&v.committed_at)?;
        let commitment = |hash: &str, salt: &str, algorithm_id: &str| {
            Ok::<_, ReceiptError>(Commitment {
                digest: Digest::from_hex(hash).map_err(invalid)?,
                salt: Salt::from_hex(salt).map_err(invalid)?,
                algorithm_id: algorithm_id.to_string(),
            })
        };
        Ok(Receipt {
            receipt_id: ReceiptId::new(v.receipt_id.clone()),
            operation_id: OperationId::new(v.operation_id.clone()),
            operation_type: v.operation_type,
            anchor_id: AnchorId::new(v.anchor_id.clone()),
            committed_at,
            input_commitment: commitment(&v.input_hash, &v.input_salt, &v.input_algorithm_id)?,
            output_commitment: commitment(
                &v.output_hash,
                &v.output_salt,
                &v.output_algorithm_id,
            )?,
            evidence_strength: v.evidence_strength,
            signature: SignatureBytes::from_hex(&v.signature).map_err(invalid)?,
        })
    }
}

fn chrono_parse(s: &str) -> Result<Timestamp, ReceiptError> {
    s.parse::<Timestamp>()
        .map_err(|e| ReceiptError::InvalidView(format!("committed_at {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maple_audit_types::now;
    use maple_crypto::{CommitmentEngine, ReceiptSigner};
    use proptest::prelude::*;

    fn signed(signer: &ReceiptSigner) -> Receipt {
        let engine = CommitmentEngine::default();
        let mut receipt = Receipt {
            receipt_id: ReceiptId::generate(),
            operation_id: OperationId::new("op-42"),
            operation_type: OperationType::Inference,
            anchor_id: AnchorId::new("model-v1"),
            committed_at: now(),
            input_commitment: engine.commit(b"prompt"),
            output_commitment: engine.commit(b"completion"),
            evidence_strength: EvidenceStrength::Summary,
            signature: SignatureBytes::from_bytes([0; 64]),
        };
        receipt.signature = signer.sign(&receipt.canonical_bytes());
        receipt
    }

    #[test]
    fn signature_covers_every_field() {
        let signer = ReceiptSigner::generate();
        let key = signer.verifying_key();
        let r = signed(&signer);
        assert!(r.verify_signature(&key));

        let mutations: Vec<Box<dyn Fn(&mut Receipt)>> = vec![
            Box::new(|r: &mut Receipt| r.receipt_id = ReceiptId::new("rcp-other")),
            Box::new(|r: &mut Receipt| r.operation_id = OperationId::new("op-43")),
            Box::new(|r: &mut Receipt| r.operation_type = OperationType::ModelTrain),
            Box::new(|r: &mut Receipt| r.anchor_id = AnchorId::new("model-v2")),
            Box::new(|r: &mut Receipt| r.committed_at += chrono::Duration::microseconds(1)),
            Box::new(|r: &mut Receipt| r.committed_at += chrono::Duration::nanoseconds(1)),
            Box::new(|r: &mut Receipt| r.input_commitment.digest = Digest::hash(b"x")),
            Box::new(|r: &mut Receipt| r.input_commitment.salt = Salt::random()),
            Box::new(|r: &mut Receipt| r.output_commitment.digest = Digest::hash(b"y")),
            Box::new(|r: &mut Receipt| r.output_commitment.salt = Salt::random()),
            Box::new(|r: &mut Receipt| r.output_commitment.algorithm_id = "blake3-256/v2".into()),
            Box::new(|r: &mut Receipt| r.evidence_strength = EvidenceStrength::Full),
        ];
        for (i, mutate) in mutations.iter().enumerate() {
            let mut tampered = r.clone();
            mutate(&mut tampered);
            assert!(!tampered.verify_signature(&key), "mutation {} went undetected", i);
        }
    }

    #[test]
    fn other_keys_do_not_verify() {
        let r = signed(&ReceiptSigner::generate());
        assert!(!r.verify_signature(&ReceiptSigner::generate().verifying_key()));
    }

    #[test]
    fn view_roundtrips_and_still_verifies() {
        let signer = ReceiptSigner::generate();
        let r = signed(&signer);
        let view = r.view();
        assert_eq!(view.input_hash, r.input_commitment.digest.to_hex());
        assert_eq!(view.committed_at, rfc3339(&r.committed_at));

        let json = serde_json::to_string(&view).unwrap();
        let parsed: ReceiptView = serde_json::from_str(&json).unwrap();
        let back = Receipt::try_from(&parsed).unwrap();
        assert_eq!(back, r);
        assert!(back.verify_signature(&signer.verifying_key()));
    }

    #[test]
    fn view_keeps_each_commitment_algorithm() {
        let signer = ReceiptSigner::generate();
        let mut r = signed(&signer);
        r.output_commitment.algorithm_id = "blake3-256/v2".into();
        r.signature = signer.sign(&r.canonical_bytes());

        let view = r.view();
        assert_eq!(view.input_algorithm_id, r.input_commitment.algorithm_id);
        assert_eq!(view.output_algorithm_id, "blake3-256/v2");
        let back = Receipt::try_from(&view).unwrap();
        assert_eq!(back, r);
        assert!(back.verify_signature(&signer.verifying_key()));
    }

    #[test]
    fn malformed_view_is_rejected() {
        let mut view = signed(&ReceiptSigner::generate()).view();
        view.output_hash = "zz".into();
        assert!(matches!(
            Receipt::try_from(&view),
            Err(ReceiptError::InvalidView(_))
        ));
    }

    proptest! {
        #[test]
        fn flipped_commitment_bit_breaks_signature(
            byte in 0usize..32,
            bit in 0u8..8,
            output in any::<bool>(),
        ) {
            let signer = ReceiptSigner::generate();
            let mut r = signed(&signer);
            let commitment = if output {
                &mut r.output_commitment
            } else {
                &mut r.input_commitment
            };
            let mut bytes = *commitment.digest.as_bytes();
            bytes[byte] ^= 1 << bit;
            commitment.digest = Digest::from_bytes(bytes);
            prop_assert!(!r.verify_signature(&signer.verifying_key()));
        }

        #[test]
        fn shifted_commit_time_breaks_signature(nanos in 1i64..1_000_000_000) {
            let signer = ReceiptSigner::generate();
            let mut r = signed(&signer);
            r.committed_at += chrono::Duration::nanoseconds(nanos);
            prop_assert!(!r.verify_signature(&signer.verifying_key()));
        }
    }
}
