//! Receipt Subsystem.
//!
//! A receipt is the minimal signed record of one gated operation: salted
//! commitments to its input and output plus identifying metadata. Full
//! evidence is optional. Depending on the caller's [`Retention`] it is kept
//! inline, summarised, or only referenced, and [`ReceiptService::materialize`]
//! reconstructs and re-verifies it when an audit asks for it.
//!
//! The write path is two-phase: [`ReceiptService::begin_operation`] runs the
//! gate pipeline and writes nothing; [`OperationHandle::finalize`] commits,
//! signs and performs exactly one WORM ledger `put`.

#![deny(unsafe_code)]

mod cache;
mod error;
mod evidence;
mod receipt;
mod service;

pub use cache::MaterializationCache;
pub use error::ReceiptError;
pub use evidence::{EvidenceCapsule, ReceiptRecord, RetainedEvidence, Retention, SuppliedEvidence};
pub use receipt::{Receipt, ReceiptView};
pub use service::{OperationHandle, OperationRequest, ReceiptService, RECEIPT_NAMESPACE};
