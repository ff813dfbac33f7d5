//! Anchor Manager.
//!
//! Anchors are durable identifiers for dataset and model versions. Receipts
//! reference them; they are written once to the WORM ledger and never
//! deleted. Models may only descend from datasets, and datasets have no
//! parent.

#![deny(unsafe_code)]

mod error;
mod manager;
mod model;

pub use error::AnchorError;
pub use manager::{AnchorManager, ANCHOR_NAMESPACE};
pub use model::Anchor;
