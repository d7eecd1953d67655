//! State snapshots with integrity hashes
//!
//! A snapshot is the full store state at a journal sequence, serialized with
//! bincode and protected by a SHA-256 hash. BTreeMaps keep serialization
//! deterministic: the same state always produces the same bytes and hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::ids::TraderId;
use types::liquidation::Liquidation;
use types::market::MarketStats;
use types::order::Order;
use types::position::Position;
use types::trade::Trade;
use types::trader::Trader;

use crate::journal::StoreRecord;

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Snapshots retained after cleanup.
const KEEP_SNAPSHOTS: usize = 3;

/// Bounded history carried in store state, matching the kernel's in-memory
/// rings. The journal remains the unbounded log.
pub const TRADE_HISTORY_CAP: usize = 1000;
pub const LIQUIDATION_HISTORY_CAP: usize = 100;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),
}

/// Full store state.
///
/// Maps are keyed by id strings so serialization order is deterministic.
/// Positions are keyed `"{trader_id}:{instrument}"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub traders: BTreeMap<String, Trader>,
    pub positions: BTreeMap<String, Position>,
    pub orders: BTreeMap<String, Order>,
    /// Newest first, capped at TRADE_HISTORY_CAP
    pub trades: Vec<Trade>,
    /// Newest first, capped at LIQUIDATION_HISTORY_CAP
    pub liquidations: Vec<Liquidation>,
    pub market_stats: BTreeMap<String, MarketStats>,
}

/// Position map key.
pub fn position_key(trader_id: TraderId, instrument: &str) -> String {
    format!("{}:{}", trader_id, instrument)
}

impl StoreState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Apply one mutation. This is the single replay rule: the writer path
    /// and journal recovery both go through here.
    pub fn apply(&mut self, record: &StoreRecord) {
        match record {
            StoreRecord::TraderUpserted(trader) => {
                self.traders.insert(trader.id.to_string(), trader.clone());
            }
            StoreRecord::PositionUpserted(position) => {
                self.positions.insert(
                    position_key(position.trader_id, &position.instrument),
                    position.clone(),
                );
            }
            StoreRecord::PositionDeleted {
                trader_id,
                instrument,
            } => {
                self.positions.remove(&position_key(*trader_id, instrument));
            }
            StoreRecord::OrderUpserted(order) => {
                self.orders.insert(order.id.to_string(), order.clone());
            }
            StoreRecord::OrderDeleted { order_id } => {
                self.orders.remove(&order_id.to_string());
            }
            StoreRecord::TradeAppended(trade) => {
                self.trades.insert(0, trade.clone());
                self.trades.truncate(TRADE_HISTORY_CAP);
            }
            StoreRecord::LiquidationAppended(liq) => {
                self.liquidations.insert(0, liq.clone());
                self.liquidations.truncate(LIQUIDATION_HISTORY_CAP);
            }
            StoreRecord::MarketStatsUpserted(stats) => {
                self.market_stats
                    .insert(stats.instrument.clone(), stats.clone());
            }
        }
    }

    /// Resting orders for an instrument, oldest first (time priority).
    pub fn open_orders(&self, instrument: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|o| o.instrument == instrument && !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Deterministic SHA-256 hash of the serialized state.
    pub fn compute_hash(&self) -> Result<String, SnapshotError> {
        let bytes =
            bincode::serialize(self).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// On-disk snapshot envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    /// Journal sequence this snapshot covers (replay resumes after it)
    sequence: u64,
    timestamp: i64,
    state_hash: String,
    state: StoreState,
}

fn snapshot_file_name(sequence: u64) -> String {
    format!("snapshot-{:020}.snap", sequence)
}

fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("snapshot-") && name.ends_with(".snap") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write a snapshot covering `sequence` and prune old ones.
pub fn write_snapshot(
    dir: &Path,
    state: &StoreState,
    sequence: u64,
    timestamp: i64,
) -> Result<(), SnapshotError> {
    fs::create_dir_all(dir)?;
    let state_hash = state.compute_hash()?;
    let snapshot = SnapshotFile {
        version: SNAPSHOT_VERSION,
        sequence,
        timestamp,
        state_hash,
        state: state.clone(),
    };
    let bytes =
        bincode::serialize(&snapshot).map_err(|e| SnapshotError::Serialization(e.to_string()))?;

    // Write to a temp file then rename so a crash never leaves a half
    // snapshot under the final name.
    let final_path = dir.join(snapshot_file_name(sequence));
    let tmp_path = final_path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, &final_path)?;

    cleanup(dir)?;
    Ok(())
}

/// Load the most recent valid snapshot, if any. Returns the state and the
/// journal sequence it covers.
pub fn load_latest(dir: &Path) -> Result<Option<(StoreState, u64)>, SnapshotError> {
    let files = snapshot_files(dir)?;

    // Newest first; fall back if one fails integrity
    for path in files.iter().rev() {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        let snapshot: SnapshotFile = match bincode::deserialize(&bytes) {
            Ok(s) => s,
            Err(_) => continue,
        };
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        let actual = snapshot.state.compute_hash()?;
        if actual != snapshot.state_hash {
            return Err(SnapshotError::IntegrityFailure {
                expected: snapshot.state_hash,
                actual,
            });
        }
        return Ok(Some((snapshot.state, snapshot.sequence)));
    }
    Ok(None)
}

fn cleanup(dir: &Path) -> Result<(), SnapshotError> {
    let files = snapshot_files(dir)?;
    if files.len() > KEEP_SNAPSHOTS {
        for path in &files[..files.len() - KEEP_SNAPSHOTS] {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}
