//! Boot from snapshot + journal replay
//!
//! Recovery process:
//! 1. Load the latest valid snapshot (if any)
//! 2. Replay journal entries with sequence > snapshot.sequence
//! 3. Hand back the state and the next journal sequence

use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::journal::{self, JournalError};
use crate::snapshot::{self, SnapshotError, StoreState};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

/// What recovery found and replayed.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// Sequence of the loaded snapshot (0 if none)
    pub snapshot_sequence: u64,
    /// Journal entries replayed on top of the snapshot
    pub replayed: u64,
    /// Sequence the journal writer should continue from
    pub next_sequence: u64,
}

/// Rebuild store state from the directory's snapshot and journal.
pub fn recover(dir: &Path) -> Result<(StoreState, RecoveryReport), RecoveryError> {
    let (mut state, snapshot_sequence) = match snapshot::load_latest(dir)? {
        Some((state, sequence)) => (state, sequence),
        None => (StoreState::empty(), 0),
    };

    let entries = journal::read_entries(dir, snapshot_sequence)?;
    let replayed = entries.len() as u64;
    let mut last_sequence = snapshot_sequence;

    for entry in &entries {
        state.apply(&entry.record);
        last_sequence = entry.sequence;
    }

    info!(
        traders = state.traders.len(),
        positions = state.positions.len(),
        orders = state.orders.len(),
        trades = state.trades.len(),
        liquidations = state.liquidations.len(),
        snapshot_sequence,
        replayed,
        "store recovered"
    );

    Ok((
        state,
        RecoveryReport {
            snapshot_sequence,
            replayed,
            next_sequence: last_sequence + 1,
        },
    ))
}
