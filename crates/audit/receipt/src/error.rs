use maple_audit_anchor::AnchorError;
use maple_audit_gate::GateFinding;
use maple_audit_ledger::LedgerError;
use maple_audit_types::{OperationId, ReceiptId};
use thiserror::Error;

/// Receipt subsystem errors.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// A blocking gate stopped the operation before anything was written.
    #[error("operation {operation_id} blocked at stage {stage}: {}", summarize(.findings))]
    GateBlocked {
        operation_id: OperationId,
        stage: String,
        findings: Vec<GateFinding>,
    },

    /// Evidence does not hash to the receipt's commitment.
    #[error("integrity violation on receipt {receipt_id}: {part} evidence does not match its commitment")]
    IntegrityViolation { receipt_id: ReceiptId, part: String },

    #[error("signature invalid for receipt {0}")]
    SignatureInvalid(ReceiptId),

    /// Summary/reference receipts need the original payload to materialize.
    #[error("receipt {0} retains no inline evidence; the original payload must be supplied")]
    EvidenceRequired(ReceiptId),

    #[error("receipt not found: {0}")]
    NotFound(ReceiptId),

    #[error("receipt already exists: {0}")]
    Conflict(ReceiptId),

    #[error("invalid operation request: {0}")]
    InvalidRequest(String),

    #[error("invalid receipt view: {0}")]
    InvalidView(String),

    #[error("anchor error: {0}")]
    Anchor(#[from] AnchorError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

fn summarize(findings: &[GateFinding]) -> String {
    findings
        .iter()
        .map(|f| format!("{} ({}): {}", f.gate, f.policy_id, f.reasons.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ReceiptError {
    /// Names of the gates that blocked, for `GateBlocked`.
    pub fn blocking_gates(&self) -> Vec<&str> {
        match self {
            ReceiptError::GateBlocked { findings, .. } => {
                findings.iter().map(|f| f.gate.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
