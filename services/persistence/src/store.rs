//! The persistence adapter
//!
//! `MarketStore` keeps the full store state in memory, journals every
//! mutation before applying it, and writes a snapshot every
//! `SNAPSHOT_EVERY` journal entries. Opening a store runs recovery.
//!
//! All operations are synchronous; the matching engine calls them from
//! inside its own critical section.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;
use types::ids::{OrderId, TraderId};
use types::liquidation::Liquidation;
use types::market::MarketStats;
use types::order::Order;
use types::position::Position;
use types::trade::Trade;
use types::trader::Trader;

use crate::journal::{JournalError, JournalWriter, StoreRecord};
use crate::recovery::{recover, RecoveryError, RecoveryReport};
use crate::snapshot::{self, position_key, SnapshotError, StoreState};

/// Journal entries between automatic snapshots.
const SNAPSHOT_EVERY: u64 = 10_000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),
}

struct StoreInner {
    state: StoreState,
    writer: JournalWriter,
    entries_since_snapshot: u64,
}

/// Durable CRUD store for traders, positions, orders, trades, liquidations
/// and market stats.
pub struct MarketStore {
    dir: PathBuf,
    inner: Mutex<StoreInner>,
}

impl MarketStore {
    /// Open (or create) a store in `dir`, recovering state from the latest
    /// snapshot plus journal tail.
    pub fn open(dir: impl AsRef<Path>) -> Result<(Self, RecoveryReport), StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let (state, report) = recover(&dir)?;
        let writer = JournalWriter::open(&dir, report.next_sequence)?;
        Ok((
            Self {
                dir,
                inner: Mutex::new(StoreInner {
                    state,
                    writer,
                    entries_since_snapshot: 0,
                }),
            },
            report,
        ))
    }

    /// Journal a batch of mutations under one fsync, then apply them to the
    /// in-memory state. This is the atomicity unit: a fill's five-record
    /// update goes through here as a single batch.
    pub fn apply_batch(&self, records: &[StoreRecord], timestamp: i64) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.writer.append_batch(records, timestamp)?;
        for record in records {
            inner.state.apply(record);
        }
        inner.entries_since_snapshot += records.len() as u64;

        if inner.entries_since_snapshot >= SNAPSHOT_EVERY {
            let covered = inner.writer.next_sequence() - 1;
            if let Err(e) = snapshot::write_snapshot(&self.dir, &inner.state, covered, timestamp) {
                warn!(error = %e, "snapshot write failed, journal remains authoritative");
            }
            inner.entries_since_snapshot = 0;
        }
        Ok(())
    }

    /// Write a snapshot now. Used at shutdown and by tests.
    pub fn snapshot(&self, timestamp: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let covered = inner.writer.next_sequence() - 1;
        snapshot::write_snapshot(&self.dir, &inner.state, covered, timestamp)?;
        inner.entries_since_snapshot = 0;
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let inner = self.inner.lock().expect("store lock poisoned");
        f(&inner.state)
    }

    // ── Traders ─────────────────────────────────────────────────────

    pub fn upsert_trader(&self, trader: &Trader, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::TraderUpserted(trader.clone())], timestamp)
    }

    pub fn get_trader(&self, id: TraderId) -> Option<Trader> {
        self.with_state(|s| s.traders.get(&id.to_string()).cloned())
    }

    pub fn get_trader_by_username(&self, username: &str) -> Option<Trader> {
        self.with_state(|s| s.traders.values().find(|t| t.username == username).cloned())
    }

    pub fn all_traders(&self) -> Vec<Trader> {
        self.with_state(|s| s.traders.values().cloned().collect())
    }

    // ── Positions ───────────────────────────────────────────────────

    pub fn upsert_position(&self, position: &Position, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::PositionUpserted(position.clone())], timestamp)
    }

    pub fn delete_position(
        &self,
        trader_id: TraderId,
        instrument: &str,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        self.apply_batch(
            &[StoreRecord::PositionDeleted {
                trader_id,
                instrument: instrument.to_string(),
            }],
            timestamp,
        )
    }

    pub fn get_position(&self, trader_id: TraderId, instrument: &str) -> Option<Position> {
        self.with_state(|s| s.positions.get(&position_key(trader_id, instrument)).cloned())
    }

    pub fn positions_for_instrument(&self, instrument: &str) -> Vec<Position> {
        self.with_state(|s| {
            s.positions
                .values()
                .filter(|p| p.instrument == instrument)
                .cloned()
                .collect()
        })
    }

    pub fn positions_for_trader(&self, trader_id: TraderId) -> Vec<Position> {
        self.with_state(|s| {
            s.positions
                .values()
                .filter(|p| p.trader_id == trader_id)
                .cloned()
                .collect()
        })
    }

    // ── Orders ──────────────────────────────────────────────────────

    pub fn upsert_order(&self, order: &Order, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::OrderUpserted(order.clone())], timestamp)
    }

    pub fn delete_order(&self, order_id: OrderId, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::OrderDeleted { order_id }], timestamp)
    }

    /// Resting orders for an instrument, oldest first (time priority for
    /// book replay).
    pub fn open_orders(&self, instrument: &str) -> Vec<Order> {
        self.with_state(|s| s.open_orders(instrument))
    }

    // ── Trades ──────────────────────────────────────────────────────

    pub fn append_trade(&self, trade: &Trade, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::TradeAppended(trade.clone())], timestamp)
    }

    /// Recent trades, newest first.
    pub fn recent_trades(&self, instrument: &str, limit: usize) -> Vec<Trade> {
        self.with_state(|s| {
            s.trades
                .iter()
                .filter(|t| t.instrument == instrument)
                .take(limit)
                .cloned()
                .collect()
        })
    }

    /// Trades where the trader was buyer or seller, newest first.
    pub fn trader_trades(&self, trader_id: TraderId, instrument: &str, limit: usize) -> Vec<Trade> {
        self.with_state(|s| {
            s.trades
                .iter()
                .filter(|t| t.instrument == instrument && t.involves(trader_id))
                .take(limit)
                .cloned()
                .collect()
        })
    }

    // ── Liquidations ────────────────────────────────────────────────

    pub fn append_liquidation(&self, liq: &Liquidation, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::LiquidationAppended(liq.clone())], timestamp)
    }

    /// Recent liquidations, newest first.
    pub fn recent_liquidations(&self, instrument: &str, limit: usize) -> Vec<Liquidation> {
        self.with_state(|s| {
            s.liquidations
                .iter()
                .filter(|l| l.instrument == instrument)
                .take(limit)
                .cloned()
                .collect()
        })
    }

    // ── Market stats ────────────────────────────────────────────────

    pub fn upsert_market_stats(&self, stats: &MarketStats, timestamp: i64) -> Result<(), StoreError> {
        self.apply_batch(&[StoreRecord::MarketStatsUpserted(stats.clone())], timestamp)
    }

    pub fn market_stats(&self, instrument: &str) -> Option<MarketStats> {
        self.with_state(|s| s.market_stats.get(instrument).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use types::numeric::{Price, Quantity};
    use types::order::{OrderType, Side};
    use types::trader::TraderType;
    use types::R_INDEX;

    fn new_trader(name: &str) -> Trader {
        Trader::new(name, TraderType::Human, Decimal::from(10_000), 1)
    }

    #[test]
    fn test_open_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let (store, report) = MarketStore::open(dir.path()).unwrap();
        assert_eq!(report.replayed, 0);
        assert!(store.all_traders().is_empty());
    }

    #[test]
    fn test_trader_crud() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = MarketStore::open(dir.path()).unwrap();

        let mut trader = new_trader("alice");
        store.upsert_trader(&trader, 1).unwrap();

        assert_eq!(store.get_trader(trader.id).unwrap().username, "alice");
        assert!(store.get_trader_by_username("alice").is_some());
        assert!(store.get_trader_by_username("nobody").is_none());

        trader.balance = dec!(9000);
        store.upsert_trader(&trader, 2).unwrap();
        assert_eq!(store.get_trader(trader.id).unwrap().balance, dec!(9000));
        assert_eq!(store.all_traders().len(), 1);
    }

    #[test]
    fn test_position_crud() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = MarketStore::open(dir.path()).unwrap();

        let trader = new_trader("alice");
        let position = Position {
            trader_id: trader.id,
            instrument: R_INDEX.to_string(),
            size: dec!(2),
            entry_price: dec!(100),
            leverage: 10,
            margin: dec!(20),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            liquidation_price: dec!(90.05),
            updated_at: 1,
        };
        store.upsert_position(&position, 1).unwrap();

        assert!(store.get_position(trader.id, R_INDEX).is_some());
        assert_eq!(store.positions_for_instrument(R_INDEX).len(), 1);
        assert_eq!(store.positions_for_trader(trader.id).len(), 1);

        store.delete_position(trader.id, R_INDEX, 2).unwrap();
        assert!(store.get_position(trader.id, R_INDEX).is_none());
    }

    #[test]
    fn test_open_orders_sorted_by_creation() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = MarketStore::open(dir.path()).unwrap();

        let trader = new_trader("alice");
        let mut early = Order::new(
            trader.id,
            R_INDEX,
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(100)),
            Quantity::from_u64(1),
            10,
            100,
        );
        let late = Order::new(
            trader.id,
            R_INDEX,
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(101)),
            Quantity::from_u64(1),
            10,
            200,
        );
        // Insert out of order
        store.upsert_order(&late, 1).unwrap();
        store.upsert_order(&early, 1).unwrap();

        let open = store.open_orders(R_INDEX);
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].id, early.id);

        // Terminal orders are excluded
        early.cancel(300);
        store.upsert_order(&early, 2).unwrap();
        assert_eq!(store.open_orders(R_INDEX).len(), 1);
    }

    #[test]
    fn test_reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let trader = new_trader("alice");
        {
            let (store, _) = MarketStore::open(dir.path()).unwrap();
            store.upsert_trader(&trader, 1).unwrap();
        }

        let (store, report) = MarketStore::open(dir.path()).unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(store.get_trader(trader.id).unwrap().username, "alice");
    }

    #[test]
    fn test_snapshot_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let trader = new_trader("alice");
        {
            let (store, _) = MarketStore::open(dir.path()).unwrap();
            store.upsert_trader(&trader, 1).unwrap();
            store.snapshot(2).unwrap();
            store.upsert_trader(&new_trader("bob"), 3).unwrap();
        }

        let (store, report) = MarketStore::open(dir.path()).unwrap();
        assert_eq!(report.snapshot_sequence, 1);
        assert_eq!(report.replayed, 1);
        assert_eq!(store.all_traders().len(), 2);
    }
}
