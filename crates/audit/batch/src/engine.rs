use std::collections::HashSet;
use std::sync::Arc;

use maple_audit_ledger::{LedgerKey, WormLedger};
use maple_audit_receipt::{Receipt, ReceiptError, ReceiptService};
use maple_audit_types::{now, BatchId, ReceiptId};
use maple_crypto::{Digest, ReceiptSigner, SignatureBytes, VerifyingKey};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BatchError;
use crate::merkle::{hash_leaf, root_from_path, MerkleTree};
use crate::model::{BatchMembership, BatchRecord, InclusionProof, SignedRoot};

/// Ledger namespace holding closed batches.
pub const BATCH_NAMESPACE: &str = "batch";
/// Ledger namespace holding per-receipt batch claims.
pub const MEMBERSHIP_NAMESPACE: &str = "batch-member";

/// Leaf hash of a receipt: its canonical bytes plus signature.
pub fn receipt_leaf(receipt: &Receipt) -> Digest {
    hash_leaf(&receipt.signed_bytes())
}

/// Closes receipts into signed Merkle batches and serves inclusion proofs.
#[derive(Clone)]
pub struct BatchEngine {
    ledger: WormLedger,
    receipts: ReceiptService,
    signer: Arc<ReceiptSigner>,
    close_lock: Arc<Mutex<()>>,
}

impl BatchEngine {
    pub fn new(ledger: WormLedger, receipts: ReceiptService, signer: Arc<ReceiptSigner>) -> Self {
        Self {
            ledger,
            receipts,
            signer,
            close_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    fn batch_key(batch_id: &BatchId) -> LedgerKey {
        LedgerKey::new(BATCH_NAMESPACE, batch_id.as_str())
    }

    fn membership_key(receipt_id: &ReceiptId) -> LedgerKey {
        LedgerKey::new(MEMBERSHIP_NAMESPACE, receipt_id.as_str())
    }

    /// Close `receipt_ids`, in the given order, into one signed batch.
    ///
    /// Every receipt must exist and must not belong to another batch. Each
    /// receipt is claimed with its own write-once membership record before
    /// the batch record is written, so a receipt can never end up in two
    /// batches.
    pub async fn close_batch(&self, receipt_ids: &[ReceiptId]) -> Result<SignedRoot, BatchError> {
        if receipt_ids.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        let mut seen = HashSet::with_capacity(receipt_ids.len());
        for id in receipt_ids {
            if !seen.insert(id) {
                return Err(BatchError::DuplicateReceipt(id.clone()));
            }
        }

        let _guard = self.close_lock.lock().await;

        let mut leaves = Vec::with_capacity(receipt_ids.len());
        for id in receipt_ids {
            if let Some(existing) = self.claim_of(id).await? {
                if !self.batch_exists(&existing).await? {
                    return Err(BatchError::IncompleteBatch {
                        receipt_id: id.clone(),
                        batch_id: existing,
                    });
                }
                return Err(BatchError::AlreadyBatched {
                    receipt_id: id.clone(),
                    batch_id: existing,
                });
            }
            let receipt = match self.receipts.get_receipt(id).await {
                Ok(r) => r,
                Err(ReceiptError::NotFound(_)) => {
                    return Err(BatchError::UnknownReceipt(id.clone()));
                }
                Err(e) => return Err(e.into()),
            };
            leaves.push(receipt_leaf(&receipt));
        }

        let tree = MerkleTree::from_leaf_hashes(leaves).ok_or(BatchError::EmptyBatch)?;
        let mut root = SignedRoot {
            batch_id: BatchId::generate(),
            root_hash: tree.root(),
            leaf_count: tree.leaf_count(),
            created_at: now(),
            signer_key_id: self.signer.key_id(),
            signature: SignatureBytes::from_bytes([0; 64]),
        };
        root.signature = self.signer.sign(&root.canonical_bytes());

        for (leaf_index, id) in receipt_ids.iter().enumerate() {
            let claim = BatchMembership {
                batch_id: root.batch_id.clone(),
                leaf_index,
            };
            if let Err(e) = self.ledger.put_json(&Self::membership_key(id), &claim).await {
                if !e.is_conflict() {
                    return Err(e.into());
                }
                let winner = self.claim_of(id).await?.unwrap_or_else(|| root.batch_id.clone());
                warn!(
                    receipt_id = %id,
                    batch_id = %winner,
                    "Receipt claimed concurrently by another batch"
                );
                return Err(BatchError::AlreadyBatched {
                    receipt_id: id.clone(),
                    batch_id: winner,
                });
            }
        }

        let record = BatchRecord {
            root: root.clone(),
            receipt_ids: receipt_ids.to_vec(),
            leaf_hashes: tree.leaves().to_vec(),
        };
        self.ledger
            .put_json(&Self::batch_key(&root.batch_id), &record)
            .await?;

        info!(
            batch_id = %root.batch_id,
            leaf_count = root.leaf_count,
            root = %root.root_hash.short(),
            "Batch closed"
        );
        Ok(root)
    }

    async fn claim_of(&self, receipt_id: &ReceiptId) -> Result<Option<BatchId>, BatchError> {
        let claim: Option<BatchMembership> = self
            .ledger
            .try_get_json(&Self::membership_key(receipt_id))
            .await?;
        Ok(claim.map(|c| c.batch_id))
    }

    async fn batch_exists(&self, batch_id: &BatchId) -> Result<bool, BatchError> {
        Ok(self.ledger.contains(&Self::batch_key(batch_id)).await?)
    }

    /// Batch that claimed `receipt_id`, if any.
    ///
    /// A claim whose batch record is missing once no close is in flight is
    /// reported as `IncompleteBatch`.
    pub async fn batch_of(&self, receipt_id: &ReceiptId) -> Result<Option<BatchId>, BatchError> {
        let Some(batch_id) = self.claim_of(receipt_id).await? else {
            return Ok(None);
        };
        if self.batch_exists(&batch_id).await? {
            return Ok(Some(batch_id));
        }

        // Claims are written before the batch record; wait out a running close.
        let _guard = self.close_lock.lock().await;
        if self.batch_exists(&batch_id).await? {
            return Ok(Some(batch_id));
        }
        warn!(
            receipt_id = %receipt_id,
            batch_id = %batch_id,
            "Membership claim points at a batch that was never written"
        );
        Err(BatchError::IncompleteBatch {
            receipt_id: receipt_id.clone(),
            batch_id,
        })
    }

    /// Stored batch, checked to reproduce its signed root.
    pub async fn get_batch(&self, batch_id: &BatchId) -> Result<BatchRecord, BatchError> {
        let record: BatchRecord = self
            .ledger
            .try_get_json(&Self::batch_key(batch_id))
            .await?
            .ok_or_else(|| BatchError::NotFound(batch_id.clone()))?;

        let corrupt = |reason: &str| BatchError::Corrupt {
            batch_id: batch_id.clone(),
            reason: reason.to_string(),
        };
        if record.receipt_ids.len() != record.leaf_hashes.len()
            || record.leaf_hashes.len() != record.root.leaf_count
        {
            return Err(corrupt("leaf count mismatch"));
        }
        let tree = MerkleTree::from_leaf_hashes(record.leaf_hashes.clone())
            .ok_or_else(|| corrupt("no leaves"))?;
        if tree.root() != record.root.root_hash {
            return Err(corrupt("leaves do not reproduce the root hash"));
        }
        Ok(record)
    }

    pub async fn signed_root(&self, batch_id: &BatchId) -> Result<SignedRoot, BatchError> {
        Ok(self.get_batch(batch_id).await?.root)
    }

    /// Inclusion proof for `receipt_id` within `batch_id`.
    pub async fn prove_inclusion(
        &self,
        receipt_id: &ReceiptId,
        batch_id: &BatchId,
    ) -> Result<InclusionProof, BatchError> {
        let record = self.get_batch(batch_id).await?;
        let not_in_batch = || BatchError::NotInBatch {
            receipt_id: receipt_id.clone(),
            batch_id: batch_id.clone(),
        };
        let leaf_index = record
            .receipt_ids
            .iter()
            .position(|id| id == receipt_id)
            .ok_or_else(not_in_batch)?;
        let tree = MerkleTree::from_leaf_hashes(record.leaf_hashes).ok_or_else(not_in_batch)?;
        let path = tree.proof(leaf_index).ok_or_else(not_in_batch)?;
        Ok(InclusionProof {
            batch_id: batch_id.clone(),
            receipt_id: receipt_id.clone(),
            leaf_index,
            leaf_count: tree.leaf_count(),
            path,
        })
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

/// Check that `receipt` is a leaf of `root` via `proof`, and that `root` is
/// signed by `key`.
///
/// Pure and total: any mismatch, including a stale or forged root, yields
/// `false`. The receipt's own signature is not checked here.
pub fn verify_inclusion(
    receipt: &Receipt,
    proof: &InclusionProof,
    root: &SignedRoot,
    key: &VerifyingKey,
) -> bool {
    if proof.batch_id != root.batch_id
        || proof.receipt_id != receipt.receipt_id
        || proof.leaf_count != root.leaf_count
    {
        return false;
    }
    if !root.verify_signature(key) {
        return false;
    }
    root_from_path(receipt_leaf(receipt), proof.leaf_index, proof.leaf_count, &proof.path)
        .is_some_and(|computed| computed == root.root_hash)
}
