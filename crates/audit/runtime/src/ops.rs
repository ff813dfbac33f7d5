//! Operational surface: `generate`, `batch`, `verify`, `materialize`.
//!
//! Thin, stable entry points for a CLI or service layer. Every failure maps
//! to a [`ResultCode`] through [`AuditError::code`].

use maple_audit_batch::{verify_inclusion, InclusionProof, SignedRoot};
use maple_audit_receipt::{
    EvidenceCapsule, OperationRequest, Receipt, ReceiptError, SuppliedEvidence,
};
use maple_audit_types::{BatchId, ReceiptId};
use maple_crypto::VerifyingKey;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::AuditContext;
use crate::error::{AuditError, AuditResult, ResultCode};

/// Gate, commit, sign and store one operation, then queue the receipt for
/// batching.
///
/// The receipt is committed once this returns `Ok`. A failure to close an
/// automatic batch afterwards is logged and leaves the receipt queued.
pub async fn generate(
    ctx: &AuditContext,
    request: OperationRequest,
    output: &[u8],
) -> AuditResult<Receipt> {
    let handle = ctx.receipts().begin_operation(request).await?;
    let receipt = handle.finalize(output).await?;

    match ctx.pending().push(receipt.receipt_id.clone()).await {
        Ok(Some(root)) => info!(
            batch_id = %root.batch_id,
            leaf_count = root.leaf_count,
            "Pending receipts reached max_leaves, batch closed"
        ),
        Ok(None) => {}
        Err(e) => warn!(
            receipt_id = %receipt.receipt_id,
            error = %e,
            "Automatic batch close failed; receipt stays queued"
        ),
    }
    Ok(receipt)
}

/// Close `receipt_ids`, in order, into one signed batch.
pub async fn batch(ctx: &AuditContext, receipt_ids: &[ReceiptId]) -> AuditResult<SignedRoot> {
    Ok(ctx.batches().close_batch(receipt_ids).await?)
}

/// Close every queued receipt into one batch, if any are queued.
pub async fn batch_pending(ctx: &AuditContext) -> AuditResult<Option<SignedRoot>> {
    Ok(ctx.pending().flush().await?)
}

/// Outcome of checking one receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub receipt_id: ReceiptId,
    pub signature_valid: bool,
    /// Batch the receipt was checked against, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_valid: Option<bool>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.signature_valid && self.inclusion_valid.unwrap_or(true)
    }

    pub fn code(&self) -> ResultCode {
        if !self.signature_valid {
            ResultCode::SignatureInvalid
        } else if self.inclusion_valid == Some(false) {
            ResultCode::IntegrityViolation
        } else {
            ResultCode::Success
        }
    }

    /// `Ok` when valid, otherwise the matching error.
    pub fn into_result(self) -> AuditResult<()> {
        if !self.signature_valid {
            return Err(ReceiptError::SignatureInvalid(self.receipt_id).into());
        }
        match (self.inclusion_valid, self.batch_id) {
            (Some(false), Some(batch_id)) => Err(AuditError::InclusionFailed {
                receipt_id: self.receipt_id,
                batch_id,
            }),
            _ => Ok(()),
        }
    }
}

/// Check a receipt's signature and, when `inclusion` is given, that it is a
/// leaf of the signed root.
///
/// Pure: needs only the receipt, the public key and optionally the proof and
/// root, so an external auditor can run it. Never fails; the answer is in
/// the report.
pub fn verify(
    receipt: &Receipt,
    key: &VerifyingKey,
    inclusion: Option<(&InclusionProof, &SignedRoot)>,
) -> VerificationReport {
    let signature_valid = receipt.verify_signature(key);
    let (batch_id, inclusion_valid) = match inclusion {
        Some((proof, root)) => (
            Some(root.batch_id.clone()),
            Some(verify_inclusion(receipt, proof, root, key)),
        ),
        None => (None, None),
    };
    let report = VerificationReport {
        receipt_id: receipt.receipt_id.clone(),
        signature_valid,
        batch_id,
        inclusion_valid,
    };
    if !report.is_valid() {
        warn!(
            receipt_id = %report.receipt_id,
            code = %report.code(),
            "Receipt verification failed"
        );
    }
    report
}

/// Verify a stored receipt against this context's key and, if the receipt
/// has been batched, against its batch's signed root.
pub async fn verify_stored(
    ctx: &AuditContext,
    receipt_id: &ReceiptId,
) -> AuditResult<VerificationReport> {
    let receipt = ctx.receipts().get_receipt(receipt_id).await?;
    let key = ctx.verifying_key();
    match ctx.batches().batch_of(receipt_id).await? {
        Some(batch_id) => {
            let proof = ctx.batches().prove_inclusion(receipt_id, &batch_id).await?;
            let root = ctx.batches().signed_root(&batch_id).await?;
            Ok(verify(&receipt, &key, Some((&proof, &root))))
        }
        None => Ok(verify(&receipt, &key, None)),
    }
}

/// Reconstruct and verify the full evidence of a receipt.
pub async fn materialize(
    ctx: &AuditContext,
    receipt_id: &ReceiptId,
    supplied: Option<SuppliedEvidence>,
) -> AuditResult<EvidenceCapsule> {
    Ok(ctx.receipts().materialize(receipt_id, supplied).await?)
}
