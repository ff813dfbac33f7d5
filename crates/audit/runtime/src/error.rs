//! Runtime errors and the stable result codes of the operational surface.

use std::fmt;

use maple_audit_anchor::AnchorError;
use maple_audit_batch::BatchError;
use maple_audit_gate::GateError;
use maple_audit_ledger::LedgerError;
use maple_audit_receipt::ReceiptError;
use maple_audit_types::{BatchId, ReceiptId};
use maple_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for runtime operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Outcome class of an operation, as reported to an external CLI or service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success,
    /// Digest mismatch between evidence and its commitment, or a failed proof.
    IntegrityViolation,
    SignatureInvalid,
    GateBlocked,
    /// Ledger key collision. May be an idempotent retry rather than corruption.
    ConflictError,
    NotFound,
    /// Rejected configuration or malformed request.
    ConfigurationError,
    StorageError,
}

impl ResultCode {
    /// Process exit code for this result.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::IntegrityViolation => 10,
            ResultCode::SignatureInvalid => 11,
            ResultCode::GateBlocked => 12,
            ResultCode::ConflictError => 13,
            ResultCode::NotFound => 14,
            ResultCode::ConfigurationError => 15,
            ResultCode::StorageError => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::IntegrityViolation => "integrity_violation",
            ResultCode::SignatureInvalid => "signature_invalid",
            ResultCode::GateBlocked => "gate_blocked",
            ResultCode::ConflictError => "conflict_error",
            ResultCode::NotFound => "not_found",
            ResultCode::ConfigurationError => "configuration_error",
            ResultCode::StorageError => "storage_error",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the audit runtime.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A receipt is not a leaf of the signed root it was checked against.
    #[error("inclusion proof for receipt {receipt_id} does not verify against batch {batch_id}")]
    InclusionFailed {
        receipt_id: ReceiptId,
        batch_id: BatchId,
    },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("anchor error: {0}")]
    Anchor(#[from] AnchorError),

    #[error("receipt error: {0}")]
    Receipt(#[from] ReceiptError),

    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
}

impl From<config::ConfigError> for AuditError {
    fn from(e: config::ConfigError) -> Self {
        AuditError::Config(e.to_string())
    }
}

fn ledger_code(e: &LedgerError) -> ResultCode {
    match e {
        LedgerError::Conflict { .. } => ResultCode::ConflictError,
        LedgerError::NotFound { .. } => ResultCode::NotFound,
        LedgerError::InvalidKey(_) => ResultCode::ConfigurationError,
        LedgerError::Serialization(_) | LedgerError::Io(_) | LedgerError::Backend(_) => {
            ResultCode::StorageError
        }
    }
}

fn anchor_code(e: &AnchorError) -> ResultCode {
    match e {
        AnchorError::NotFound(_) => ResultCode::NotFound,
        AnchorError::Conflict(_) => ResultCode::ConflictError,
        AnchorError::InvalidParent { .. } | AnchorError::InvalidId(_) => {
            ResultCode::ConfigurationError
        }
        AnchorError::LineageCycle(_) => ResultCode::IntegrityViolation,
        AnchorError::Ledger(e) => ledger_code(e),
    }
}

fn receipt_code(e: &ReceiptError) -> ResultCode {
    match e {
        ReceiptError::GateBlocked { .. } => ResultCode::GateBlocked,
        ReceiptError::IntegrityViolation { .. } => ResultCode::IntegrityViolation,
        ReceiptError::SignatureInvalid(_) => ResultCode::SignatureInvalid,
        ReceiptError::EvidenceRequired(_) | ReceiptError::NotFound(_) => ResultCode::NotFound,
        ReceiptError::Conflict(_) => ResultCode::ConflictError,
        ReceiptError::InvalidRequest(_) | ReceiptError::InvalidView(_) => {
            ResultCode::ConfigurationError
        }
        ReceiptError::Anchor(e) => anchor_code(e),
        ReceiptError::Ledger(e) => ledger_code(e),
    }
}

fn batch_code(e: &BatchError) -> ResultCode {
    match e {
        BatchError::EmptyBatch | BatchError::DuplicateReceipt(_) => ResultCode::ConfigurationError,
        BatchError::UnknownReceipt(_) | BatchError::NotFound(_) | BatchError::NotInBatch { .. } => {
            ResultCode::NotFound
        }
        BatchError::AlreadyBatched { .. } => ResultCode::ConflictError,
        BatchError::Corrupt { .. } => ResultCode::IntegrityViolation,
        BatchError::IncompleteBatch { .. } => ResultCode::StorageError,
        BatchError::Receipt(e) => receipt_code(e),
        BatchError::Ledger(e) => ledger_code(e),
    }
}

impl AuditError {
    pub fn code(&self) -> ResultCode {
        match self {
            AuditError::Config(_) | AuditError::Gate(_) => ResultCode::ConfigurationError,
            AuditError::InclusionFailed { .. } => ResultCode::IntegrityViolation,
            AuditError::Crypto(CryptoError::Io(_)) => ResultCode::StorageError,
            AuditError::Crypto(_) => ResultCode::ConfigurationError,
            AuditError::Ledger(e) => ledger_code(e),
            AuditError::Anchor(e) => anchor_code(e),
            AuditError::Receipt(e) => receipt_code(e),
            AuditError::Batch(e) => batch_code(e),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            ResultCode::Success,
            ResultCode::IntegrityViolation,
            ResultCode::SignatureInvalid,
            ResultCode::GateBlocked,
            ResultCode::ConflictError,
            ResultCode::NotFound,
            ResultCode::ConfigurationError,
            ResultCode::StorageError,
        ];
        let mut seen: Vec<i32> = codes.iter().map(|c| c.exit_code()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
        assert_eq!(ResultCode::Success.exit_code(), 0);
    }

    #[test]
    fn nested_errors_keep_their_class() {
        let conflict = LedgerError::Conflict { key: "receipt:rcp-1".into() };
        let err = AuditError::Batch(BatchError::Receipt(ReceiptError::Ledger(conflict)));
        assert_eq!(err.code(), ResultCode::ConflictError);

        let err = AuditError::Receipt(ReceiptError::IntegrityViolation {
            receipt_id: ReceiptId::new("rcp-1"),
            part: "output".into(),
        });
        assert_eq!(err.code(), ResultCode::IntegrityViolation);
        assert_eq!(err.exit_code(), 10);

        let err = AuditError::Receipt(ReceiptError::SignatureInvalid(ReceiptId::new("rcp-1")));
        assert_eq!(err.code(), ResultCode::SignatureInvalid);
    }

    #[test]
    fn unknown_algorithm_is_a_configuration_error() {
        let err = AuditError::from(CryptoError::UnknownAlgorithm("md5".into()));
        assert_eq!(err.code(), ResultCode::ConfigurationError);
    }
}
