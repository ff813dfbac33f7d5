//! Batch / Proof Engine.
//!
//! Rolls receipts into a binary Merkle tree (leaf order is exactly the order
//! given to [`BatchEngine::close_batch`]), signs the root once per batch and
//! serves per-receipt inclusion proofs. [`verify_inclusion`] needs only the
//! receipt, the proof, the signed root and the public key, so any external
//! auditor can run it.

#![deny(unsafe_code)]

mod engine;
mod error;
pub mod merkle;
mod model;

pub use engine::{
    receipt_leaf, verify_inclusion, BatchEngine, BATCH_NAMESPACE, MEMBERSHIP_NAMESPACE,
};
pub use error::BatchError;
pub use merkle::{MerkleTree, ProofStep};
pub use model::{BatchMembership, BatchRecord, InclusionProof, SignedRoot};
