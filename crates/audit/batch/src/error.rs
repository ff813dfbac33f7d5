use maple_audit_ledger::LedgerError;
use maple_audit_receipt::ReceiptError;
use maple_audit_types::{BatchId, ReceiptId};
use thiserror::Error;

/// Batch/proof engine errors.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot close an empty batch")]
    EmptyBatch,

    #[error("receipt {0} appears more than once in the batch")]
    DuplicateReceipt(ReceiptId),

    #[error("unknown receipt: {0}")]
    UnknownReceipt(ReceiptId),

    /// Each receipt belongs to at most one batch.
    #[error("receipt {receipt_id} is already in batch {batch_id}")]
    AlreadyBatched {
        receipt_id: ReceiptId,
        batch_id: BatchId,
    },

    #[error("batch not found: {0}")]
    NotFound(BatchId),

    /// A membership claim names a batch whose record was never written.
    #[error("receipt {receipt_id} is claimed by batch {batch_id}, which was never completed")]
    IncompleteBatch {
        receipt_id: ReceiptId,
        batch_id: BatchId,
    },

    #[error("receipt {receipt_id} is not in batch {batch_id}")]
    NotInBatch {
        receipt_id: ReceiptId,
        batch_id: BatchId,
    },

    /// Stored batch data does not reproduce its signed root.
    #[error("batch {batch_id} is inconsistent: {reason}")]
    Corrupt { batch_id: BatchId, reason: String },

    #[error("receipt error: {0}")]
    Receipt(#[from] ReceiptError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
