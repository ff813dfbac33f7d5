//! WORM Ledger — the single place audit immutability is enforced.
//!
//! A write-once-read-many key/value store. `put` succeeds only when the key is
//! absent; there is no update and no delete. Two backends ship:
//!
//! - [`InMemoryWormStore`] for tests and embedding,
//! - [`FileWormStore`], durable: each value is synced to disk and linked into
//!   place with a no-clobber rename before `put` returns.
//!
//! A `put` on an existing key, including one that loses a race with a
//! concurrent `put`, surfaces as [`LedgerError::Conflict`]. The ledger never
//! retries; the caller decides whether the conflict means "already done" or a
//! genuine bug.

#![deny(unsafe_code)]

mod error;
mod file;
mod key;
mod ledger;
mod memory;
mod traits;

pub use error::{LedgerError, LedgerResult};
pub use file::FileWormStore;
pub use key::LedgerKey;
pub use ledger::WormLedger;
pub use memory::InMemoryWormStore;
pub use traits::WormStore;
