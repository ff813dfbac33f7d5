//! Shared vocabulary for the MAPLE audit trail.
//!
//! Strongly typed identifiers and the closed enums every audit component
//! agrees on. No behaviour beyond parsing and display lives here.

#![deny(unsafe_code)]

mod ids;
mod kinds;
mod time;

pub use ids::{AnchorId, BatchId, OperationId, ReceiptId};
pub use kinds::{AnchorKind, ConsentStatus, EvidenceStrength, OperationType, UnknownVariant};
pub use time::{now, rfc3339, Timestamp};
