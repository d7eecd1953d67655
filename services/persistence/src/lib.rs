//! Durable store for the trading kernel
//!
//! Provides the persistence adapter behind the matching engine: an
//! append-only journal of entity mutations with CRC32C checksums, periodic
//! full-state snapshots with SHA-256 integrity hashes, and replay-based
//! crash recovery.
//!
//! The contract: after a kernel operation returns, every record it touched
//! is in the journal, and reopening the store reproduces the same state. A
//! fill's multi-record update (trade, two orders, two positions, two
//! traders, market stats) is journaled as one batch under one fsync so
//! replay never observes a partial fill.

pub mod journal;
pub mod recovery;
pub mod snapshot;
pub mod store;

pub use journal::{JournalError, StoreRecord};
pub use recovery::{recover, RecoveryError, RecoveryReport};
pub use snapshot::StoreState;
pub use store::{MarketStore, StoreError};
