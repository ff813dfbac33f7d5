use maple_audit_types::{rfc3339, BatchId, ReceiptId, Timestamp};
use maple_crypto::{verify_signature, Digest, SignatureBytes, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::merkle::ProofStep;

const ROOT_DOMAIN: &[u8] = b"maple-audit/batch-root/v1";

/// One signature over the Merkle root of a closed batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRoot {
    pub batch_id: BatchId,
    pub root_hash: Digest,
    pub leaf_count: usize,
    pub created_at: Timestamp,
    pub signer_key_id: String,
    pub signature: SignatureBytes,
}

impl SignedRoot {
    /// Bytes covered by `signature`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let leaf_count = (self.leaf_count as u64).to_be_bytes();
        let created_at = rfc3339(&self.created_at);
        let parts: [&[u8]; 6] = [
            ROOT_DOMAIN,
            self.batch_id.as_str().as_bytes(),
            self.root_hash.as_bytes(),
            &leaf_count,
            created_at.as_bytes(),
            self.signer_key_id.as_bytes(),
        ];
        let mut buf = Vec::with_capacity(128);
        for part in parts {
            buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
            buf.extend_from_slice(part);
        }
        buf
    }

    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        verify_signature(&self.canonical_bytes(), &self.signature, key)
    }
}

/// Sibling path proving one receipt is a leaf of one signed root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub batch_id: BatchId,
    pub receipt_id: ReceiptId,
    pub leaf_index: usize,
    pub leaf_count: usize,
    pub path: Vec<ProofStep>,
}

/// What `batch/<batch_id>` holds: the signed root and the fixed leaf order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub root: SignedRoot,
    pub receipt_ids: Vec<ReceiptId>,
    pub leaf_hashes: Vec<Digest>,
}

/// What `batch-member/<receipt_id>` holds: the claim of one receipt by one
/// batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMembership {
    pub batch_id: BatchId,
    pub leaf_index: usize,
}
