//! MAPLE audit runtime.
//!
//! Wires the commitment engine, WORM ledger, anchor manager, gate
//! orchestrator, receipt subsystem and batch engine into one explicit
//! [`AuditContext`]:
//!
//! ```text
//! AuditConfig::load ──► AuditContext::bootstrap(config, registry)
//!                          │
//!      ops::generate ──────┤  gate → commit → sign → WORM put → queue
//!      ops::batch ─────────┤  Merkle root → sign → WORM put
//!      ops::verify ────────┤  signature (+ inclusion proof)
//!      ops::materialize ───┘  evidence ↔ commitment
//!                          │
//!               AuditContext::shutdown  (stop roller, final batch)
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod ops;
pub mod pending;
pub mod telemetry;

pub use config::{
    AuditConfig, BatchConfig, CommitmentConfig, LedgerConfig, LoggingConfig, SignerConfig,
};
pub use context::AuditContext;
pub use error::{AuditError, AuditResult, ResultCode};
pub use ops::VerificationReport;
pub use pending::{BatchRoller, PendingReceipts};
pub use telemetry::init_tracing;
