use maple_audit_ledger::LedgerError;
use maple_audit_types::AnchorId;
use thiserror::Error;

/// Errors from the anchor manager.
#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("anchor not found: {0}")]
    NotFound(AnchorId),

    /// An anchor with this id exists and differs from the one requested.
    #[error("anchor conflict: {0} already exists with different attributes")]
    Conflict(AnchorId),

    #[error("invalid parent for anchor {anchor_id}: {reason}")]
    InvalidParent { anchor_id: AnchorId, reason: String },

    #[error("invalid anchor id: {0:?}")]
    InvalidId(String),

    #[error("anchor lineage of {0} contains a cycle")]
    LineageCycle(AnchorId),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
