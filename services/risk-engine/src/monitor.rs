//! Liquidation monitor
//!
//! Wakes on a timer, reads the mark price, and force-closes every position
//! whose threshold the mark has crossed. Liquidations settle against the
//! insurance fund: margin surplus flows in, shortfall is paid out up to the
//! fund balance, and any residual beyond that is forgiven.
//!
//! Positions in one scan are processed in trader-id order so identical
//! state always produces identical results.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use types::clock;
use types::config::LiquidationConfig;
use types::errors::EngineError;
use types::ids::{LiquidationId, TraderId};
use types::liquidation::Liquidation;
use types::numeric::{Price, Quantity};
use types::order::Side;
use types::position::Position;

use crate::insurance::InsuranceFund;
use crate::liquidation::{loss_at_mark, should_liquidate};

/// Gives the current mark price. Implemented by the matching engine (last
/// trade price, or the configured start price before any trade).
pub trait PriceProvider: Send + Sync {
    fn mark_price(&self, instrument: &str) -> Decimal;
}

/// Position access and forced closure. Implemented by the matching engine.
pub trait PositionStore: Send + Sync {
    /// All non-flat positions for the instrument.
    fn open_positions(&self, instrument: &str) -> Vec<Position>;

    /// Close a position at mark price: realize P&L, credit the trader
    /// `margin + pnl`, delete the position.
    fn close_position(
        &self,
        trader_id: TraderId,
        instrument: &str,
        mark_price: Decimal,
    ) -> Result<(), EngineError>;

    /// Record a completed liquidation (history, persistence, events).
    fn record_liquidation(&self, liquidation: Liquidation);
}

/// Handle to a running monitor task.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal shutdown and wait for the monitor to finish its in-flight
    /// scan.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
        info!("liquidation monitor stopped");
    }
}

/// Periodic scanner that force-closes underwater positions.
pub struct LiquidationMonitor<P, S> {
    cfg: LiquidationConfig,
    instrument: String,
    prices: Arc<P>,
    positions: Arc<S>,
    fund: Arc<InsuranceFund>,
}

impl<P, S> LiquidationMonitor<P, S>
where
    P: PriceProvider + 'static,
    S: PositionStore + 'static,
{
    pub fn new(
        cfg: LiquidationConfig,
        instrument: impl Into<String>,
        prices: Arc<P>,
        positions: Arc<S>,
        fund: Arc<InsuranceFund>,
    ) -> Self {
        Self {
            cfg,
            instrument: instrument.into(),
            prices,
            positions,
            fund,
        }
    }

    /// Spawn the scan loop on the current tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval_ms = self.cfg.check_interval_ms;
        let task = tokio::spawn(self.run(shutdown_rx));
        info!(interval_ms, "liquidation monitor started");
        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = std::time::Duration::from_millis(self.cfg.check_interval_ms);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.scan();
                }
            }
        }
    }

    /// One scan pass. Public so tests can drive it without timers.
    pub fn scan(&self) {
        let mark_price = self.prices.mark_price(&self.instrument);
        if mark_price <= Decimal::ZERO {
            return; // no price available yet
        }

        let mut positions = self.positions.open_positions(&self.instrument);
        positions.sort_by_key(|p| p.trader_id);

        for position in positions {
            if should_liquidate(&position, mark_price) {
                self.liquidate(&position, mark_price);
            }
        }
    }

    fn liquidate(&self, position: &Position, mark_price: Decimal) {
        let now = clock::now_nanos();
        let loss = loss_at_mark(position, mark_price);

        let side = if position.is_long() {
            Side::Buy
        } else {
            Side::Sell
        };

        // Settle the insurance fund before touching the position
        let insurance_fund_hit = if loss > position.margin {
            let shortfall = loss - position.margin;
            let covered = self.fund.cover_shortfall(shortfall, now);
            if covered < shortfall {
                warn!(
                    trader = %position.trader_id.short(),
                    shortfall = %shortfall,
                    covered = %covered,
                    "insurance fund depleted, residual loss forgiven"
                );
            }
            true
        } else {
            self.fund.absorb_surplus(position.margin - loss, now);
            false
        };

        let (Some(size), Some(entry_price), Some(liquidation_price), Some(mark)) = (
            Quantity::try_new(position.size.abs()),
            Price::try_new(position.entry_price),
            Price::try_new(position.liquidation_price),
            Price::try_new(mark_price),
        ) else {
            warn!(trader = %position.trader_id.short(), "skipping liquidation of malformed position");
            return;
        };

        let liquidation = Liquidation {
            id: LiquidationId::new(),
            trader_id: position.trader_id,
            instrument: position.instrument.clone(),
            side,
            size,
            entry_price,
            liquidation_price,
            mark_price: mark,
            leverage: position.leverage,
            loss,
            insurance_fund_hit,
            timestamp: now,
        };

        if let Err(e) =
            self.positions
                .close_position(position.trader_id, &position.instrument, mark_price)
        {
            warn!(trader = %position.trader_id.short(), error = %e, "forced close failed");
            return;
        }

        info!(
            trader = %position.trader_id.short(),
            side = ?side,
            size = %liquidation.size,
            mark = %mark_price,
            leverage = position.leverage,
            loss = %loss,
            "liquidation"
        );

        self.positions.record_liquidation(liquidation);
    }

    /// Current insurance fund balance.
    pub fn insurance_fund(&self) -> Decimal {
        self.fund.balance()
    }
}
