//! Matching engine core
//!
//! One exclusive lock guards the books, positions, traders and history
//! rings for the duration of submit, cancel and forced-close operations;
//! read-only queries share it. The persistence adapter and the event
//! channel are invoked from inside the critical section, and neither calls
//! back into the engine.
//!
//! Price-time priority: levels are visited in strict price order, FIFO
//! within a level, and the trade always prints at the resting order's
//! price. Orders from the same trader are skipped silently.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use market_data::candles::{self, Candle, CandleInterval};
use market_data::stats;
use persistence::{MarketStore, StoreRecord};
use risk_engine::insurance::InsuranceFund;
use risk_engine::margin::validate_leverage;
use risk_engine::monitor::{PositionStore, PriceProvider};
use types::clock;
use types::config::KernelConfig;
use types::errors::{EngineError, InvalidOrderReason};
use types::ids::{OrderId, TraderId};
use types::liquidation::Liquidation;
use types::market::{BookSnapshot, MarketStats, OpenInterestBreakdown};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::position::Position;
use types::trade::Trade;
use types::trader::Trader;

use crate::book::OrderBook;
use crate::events::{EngineEvent, EventSender};
use crate::ledger;

/// In-memory history caps; the journal keeps the full log.
const TRADE_RING_CAP: usize = 1000;
const LIQUIDATION_RING_CAP: usize = 100;

/// Depth of book snapshots attached to book events.
const BOOK_EVENT_DEPTH: usize = 20;

/// What the API layer submits. The engine assigns id, status and
/// timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    pub trader_id: TraderId,
    pub instrument: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Required for limit orders, ignored for market orders
    pub price: Option<Decimal>,
    pub size: Decimal,
    pub leverage: u32,
}

/// Everything behind the engine lock.
struct EngineCore {
    books: HashMap<String, OrderBook>,
    /// Keyed (instrument, trader); flat positions are never stored
    positions: BTreeMap<(String, TraderId), Position>,
    traders: HashMap<TraderId, Trader>,
    /// Newest first
    recent_trades: Vec<Trade>,
    /// Newest first
    recent_liquidations: Vec<Liquidation>,
}

/// The single synchronous authority over book and ledger.
pub struct MatchingEngine {
    cfg: KernelConfig,
    starting_price: Price,
    store: Option<Arc<MarketStore>>,
    fund: Arc<InsuranceFund>,
    events: EventSender,
    inner: RwLock<EngineCore>,
}

impl MatchingEngine {
    pub fn new(cfg: KernelConfig, store: Option<Arc<MarketStore>>, events: EventSender) -> Self {
        let starting_price =
            Price::try_new(cfg.instrument.starting_price).unwrap_or_else(|| Price::from_u64(1000));
        let fund = Arc::new(InsuranceFund::new(cfg.liquidation.insurance_fund_initial));
        Self {
            cfg,
            starting_price,
            store,
            fund,
            events,
            inner: RwLock::new(EngineCore {
                books: HashMap::new(),
                positions: BTreeMap::new(),
                traders: HashMap::new(),
                recent_trades: Vec::new(),
                recent_liquidations: Vec::new(),
            }),
        }
    }

    /// The insurance fund shared with the liquidation monitor.
    pub fn insurance_fund(&self) -> Arc<InsuranceFund> {
        Arc::clone(&self.fund)
    }

    /// Create an order book for an instrument. Idempotent.
    pub fn register_instrument(&self, instrument: &str) {
        let mut core = self.write();
        core.books
            .entry(instrument.to_string())
            .or_insert_with(|| OrderBook::new(instrument));
    }

    /// Idempotent trader upsert.
    pub fn register_trader(&self, trader: Trader) {
        let now = clock::now_nanos();
        let mut core = self.write();
        core.traders.insert(trader.id, trader.clone());
        self.persist(vec![StoreRecord::TraderUpserted(trader)], now);
    }

    // ── Order intake ────────────────────────────────────────────────

    /// Submit an order: validate, match, rest or cancel the remainder,
    /// persist and emit. Returns the updated order and its trades in
    /// execution order.
    pub fn submit(&self, request: OrderRequest) -> Result<(Order, Vec<Trade>), EngineError> {
        let now = clock::now_nanos();
        let mut core = self.write();

        if !core.books.contains_key(&request.instrument) {
            return Err(EngineError::UnknownInstrument(request.instrument));
        }
        if !core.traders.contains_key(&request.trader_id) {
            return Err(EngineError::UnknownTrader(request.trader_id));
        }
        let mut order = self.validate(&request, now)?;

        let mut trades = Vec::new();
        let mut skipped_self = false;
        let instrument = order.instrument.clone();
        let limit = match order.order_type {
            OrderType::Limit => order.price,
            OrderType::Market => None,
        };

        let book = core.books.get(&instrument).expect("book checked above");
        let prices = book.crossable_prices(order.side, limit);

        'levels: for price in prices {
            if order.remaining_size().is_zero() {
                break;
            }
            let entries = core
                .books
                .get(&instrument)
                .expect("book checked above")
                .opposite_entries_at(order.side, price);

            for entry in entries {
                if order.remaining_size().is_zero() {
                    break 'levels;
                }
                // Self-trade prevention: the resting order keeps its place
                if entry.trader_id == order.trader_id {
                    skipped_self = true;
                    continue;
                }
                let fill = order.remaining_size().min(entry.remaining);
                let trade =
                    self.execute_fill(&mut core, &mut order, entry.order_id, price, fill, now);
                trades.push(trade);
            }
        }

        // Remainder handling
        if !order.remaining_size().is_zero() {
            match order.order_type {
                OrderType::Limit => {
                    let book = core.books.get_mut(&instrument).expect("book checked above");
                    book.add(order.clone());
                    self.persist(vec![StoreRecord::OrderUpserted(order.clone())], now);
                }
                OrderType::Market => {
                    if trades.is_empty() && skipped_self {
                        // Everything on the other side was our own
                        return Err(EngineError::SelfTradeOnly);
                    }
                    // No remainder ever rests
                    order.cancel(now);
                }
            }
        }

        self.events.emit(EngineEvent::Order(order.clone()));
        self.emit_book_update(&core, &instrument, now);
        self.persist_market_stats(&core, &instrument, now);

        Ok((order, trades))
    }

    fn validate(&self, request: &OrderRequest, now: i64) -> Result<Order, EngineError> {
        if request.size <= Decimal::ZERO {
            return Err(InvalidOrderReason::NonPositiveSize.into());
        }
        if request.size < self.cfg.instrument.min_order_size {
            return Err(InvalidOrderReason::BelowMinimumSize {
                size: request.size.to_string(),
                min: self.cfg.instrument.min_order_size.to_string(),
            }
            .into());
        }
        if !validate_leverage(request.leverage, self.cfg.instrument.max_leverage) {
            return Err(InvalidOrderReason::LeverageOutOfRange {
                leverage: request.leverage,
                max: self.cfg.instrument.max_leverage,
            }
            .into());
        }

        let price = match request.order_type {
            OrderType::Limit => {
                let price = request
                    .price
                    .and_then(Price::try_new)
                    .ok_or(InvalidOrderReason::NonPositivePrice)?;
                Some(price)
            }
            OrderType::Market => None,
        };
        let size = Quantity::try_new(request.size).ok_or(InvalidOrderReason::NonPositiveSize)?;

        Ok(Order::new(
            request.trader_id,
            request.instrument.clone(),
            request.side,
            request.order_type,
            price,
            size,
            request.leverage,
            now,
        ))
    }

    /// Execute one fill between the aggressor and a resting order: update
    /// both orders, both positions, both traders, the trade ring and the
    /// store, then emit trade → order → position events.
    fn execute_fill(
        &self,
        core: &mut EngineCore,
        aggressor: &mut Order,
        resting_id: OrderId,
        price: Price,
        fill: Quantity,
        now: i64,
    ) -> Trade {
        let instrument = aggressor.instrument.clone();

        aggressor.add_fill(fill, now);
        let resting = core
            .books
            .get_mut(&instrument)
            .expect("book exists during matching")
            .apply_fill(resting_id, fill, now)
            .expect("resting order vanished mid-level");

        let (buyer_order, seller_order) = match aggressor.side {
            Side::Buy => (&*aggressor, &resting),
            Side::Sell => (&resting, &*aggressor),
        };
        let buyer_id = buyer_order.trader_id;
        let seller_id = seller_order.trader_id;
        let buyer_order_id = buyer_order.id;
        let seller_order_id = seller_order.id;
        let buyer_leverage = buyer_order.leverage;
        let seller_leverage = seller_order.leverage;

        // Position updates: buyer +size, seller −size at the fill price
        let margins = &self.cfg.liquidation.maintenance_margins;
        let buyer_key = (instrument.clone(), buyer_id);
        let seller_key = (instrument.clone(), seller_id);

        let buyer_update = ledger::apply_delta(
            core.positions.get(&buyer_key),
            buyer_id,
            &instrument,
            fill.as_decimal(),
            price.as_decimal(),
            buyer_leverage,
            margins,
            now,
        );
        match &buyer_update.position {
            Some(position) => {
                core.positions.insert(buyer_key, position.clone());
            }
            None => {
                core.positions.remove(&buyer_key);
            }
        }

        let seller_update = ledger::apply_delta(
            core.positions.get(&seller_key),
            seller_id,
            &instrument,
            -fill.as_decimal(),
            price.as_decimal(),
            seller_leverage,
            margins,
            now,
        );
        match &seller_update.position {
            Some(position) => {
                core.positions.insert(seller_key, position.clone());
            }
            None => {
                core.positions.remove(&seller_key);
            }
        }

        let trade = Trade {
            id: types::ids::TradeId::new(),
            instrument: instrument.clone(),
            price,
            size: fill,
            timestamp: now,
            buyer_id,
            seller_id,
            buyer_order_id,
            seller_order_id,
            buyer_leverage,
            seller_leverage,
            buyer_effect: buyer_update.effect,
            seller_effect: seller_update.effect,
            buyer_new_position: buyer_update.new_size,
            seller_new_position: seller_update.new_size,
            aggressor_side: aggressor.side,
        };
        debug_assert!(trade.validate_no_self_trade());

        core.recent_trades.insert(0, trade.clone());
        core.recent_trades.truncate(TRADE_RING_CAP);

        // Trader stats: trade count, leverage high-water mark, realized P&L
        let mut trader_records = Vec::with_capacity(2);
        if let Some(buyer) = core.traders.get_mut(&buyer_id) {
            buyer.record_trade(buyer_leverage);
            buyer.total_pnl += buyer_update.realized_delta;
            trader_records.push(StoreRecord::TraderUpserted(buyer.clone()));
        }
        if let Some(seller) = core.traders.get_mut(&seller_id) {
            seller.record_trade(seller_leverage);
            seller.total_pnl += seller_update.realized_delta;
            trader_records.push(StoreRecord::TraderUpserted(seller.clone()));
        }

        // One durable batch per fill
        let mut records = vec![StoreRecord::TradeAppended(trade.clone())];
        if resting.is_filled() {
            records.push(StoreRecord::OrderDeleted {
                order_id: resting.id,
            });
        } else {
            records.push(StoreRecord::OrderUpserted(resting.clone()));
        }
        records.push(position_record(&buyer_update, buyer_id, &instrument));
        records.push(position_record(&seller_update, seller_id, &instrument));
        records.extend(trader_records);
        self.persist(records, now);

        info!(
            size = %trade.size,
            price = %trade.price,
            buyer = %trade.buyer_id.short(),
            seller = %trade.seller_id.short(),
            aggressor = ?trade.aggressor_side,
            "trade"
        );

        // Trade first, then the order and position updates derived from it
        self.events.emit(EngineEvent::Trade(trade.clone()));
        self.events.emit(EngineEvent::Order(resting));
        self.emit_position_update(&buyer_update, buyer_id, &instrument);
        self.emit_position_update(&seller_update, seller_id, &instrument);

        trade
    }

    fn emit_position_update(
        &self,
        update: &ledger::PositionUpdate,
        trader_id: TraderId,
        instrument: &str,
    ) {
        match &update.position {
            Some(position) => self.events.emit(EngineEvent::Position(position.clone())),
            None => self.events.emit(EngineEvent::PositionClosed {
                trader_id,
                instrument: instrument.to_string(),
            }),
        }
    }

    fn emit_book_update(&self, core: &EngineCore, instrument: &str, now: i64) {
        if let Some(book) = core.books.get(instrument) {
            self.events
                .emit(EngineEvent::Book(book.snapshot(BOOK_EVENT_DEPTH, now)));
        }
    }

    // ── Cancellation ────────────────────────────────────────────────

    /// Cancel a resting order. Fails if the order is unknown, terminal, or
    /// was never resting — the book only ever holds live orders.
    pub fn cancel(&self, order_id: OrderId, instrument: &str) -> Result<Order, EngineError> {
        let now = clock::now_nanos();
        let mut core = self.write();

        let book = core
            .books
            .get_mut(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        let mut order = book.remove(order_id).ok_or(EngineError::NotFound(order_id))?;
        order.cancel(now);

        self.persist(vec![StoreRecord::OrderDeleted { order_id }], now);
        self.events.emit(EngineEvent::Order(order.clone()));
        self.emit_book_update(&core, instrument, now);
        Ok(order)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn get_order_book(&self, instrument: &str, depth: usize) -> Result<BookSnapshot, EngineError> {
        let core = self.read();
        let book = core
            .books
            .get(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        Ok(book.snapshot(depth, clock::now_nanos()))
    }

    pub fn get_position(&self, trader_id: TraderId, instrument: &str) -> Option<Position> {
        let core = self.read();
        core.positions
            .get(&(instrument.to_string(), trader_id))
            .cloned()
    }

    /// All non-flat positions. Flat ones are never stored.
    pub fn get_all_positions(&self, instrument: &str) -> Vec<Position> {
        let core = self.read();
        core.positions
            .values()
            .filter(|p| p.instrument == instrument)
            .cloned()
            .collect()
    }

    pub fn get_trader(&self, trader_id: TraderId) -> Option<Trader> {
        self.read().traders.get(&trader_id).cloned()
    }

    pub fn get_all_traders(&self) -> Vec<Trader> {
        self.read().traders.values().cloned().collect()
    }

    /// Recent trades, newest first.
    pub fn get_recent_trades(&self, instrument: &str, limit: usize) -> Vec<Trade> {
        let core = self.read();
        core.recent_trades
            .iter()
            .filter(|t| t.instrument == instrument)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Trades where the trader was on either side, newest first.
    pub fn get_trader_trades(
        &self,
        trader_id: TraderId,
        instrument: &str,
        limit: usize,
    ) -> Vec<Trade> {
        let core = self.read();
        core.recent_trades
            .iter()
            .filter(|t| t.instrument == instrument && t.involves(trader_id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Trades within [start, end], newest first.
    pub fn get_historical_trades(
        &self,
        instrument: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Vec<Trade> {
        let core = self.read();
        core.recent_trades
            .iter()
            .filter(|t| t.instrument == instrument && t.timestamp >= start && t.timestamp <= end)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_recent_liquidations(&self, instrument: &str, limit: usize) -> Vec<Liquidation> {
        let core = self.read();
        core.recent_liquidations
            .iter()
            .filter(|l| l.instrument == instrument)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_open_interest(&self, instrument: &str) -> OpenInterestBreakdown {
        let core = self.read();
        let positions: Vec<Position> = core
            .positions
            .values()
            .filter(|p| p.instrument == instrument)
            .cloned()
            .collect();
        stats::open_interest(&positions, instrument, clock::now_nanos())
    }

    pub fn get_market_stats(&self, instrument: &str) -> MarketStats {
        let core = self.read();
        self.compute_stats(&core, instrument, clock::now_nanos())
    }

    pub fn get_candles(&self, instrument: &str, interval: CandleInterval, limit: usize) -> Vec<Candle> {
        let core = self.read();
        candles::build_candles(&core.recent_trades, instrument, interval, limit)
    }

    pub fn get_historical_candles(
        &self,
        instrument: &str,
        interval: CandleInterval,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Vec<Candle> {
        let core = self.read();
        candles::build_candles_between(&core.recent_trades, instrument, interval, start, end, limit)
    }

    /// Mark price: last trade price, or the configured starting price
    /// before any trade. Deliberately not the book mid — a single tiny
    /// quote must not move the liquidation trigger.
    pub fn get_mark_price(&self, instrument: &str) -> Decimal {
        let core = self.read();
        core.recent_trades
            .iter()
            .find(|t| t.instrument == instrument)
            .map(|t| t.price.as_decimal())
            .unwrap_or_else(|| self.starting_price.as_decimal())
    }

    // ── Recovery ────────────────────────────────────────────────────

    /// Rebuild in-memory state from the store: traders, open positions,
    /// resting orders (in time priority), trade and liquidation history.
    /// Market stats derive from the loaded trades.
    pub fn load_from_store(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let mut core = self.write();

        for trader in store.all_traders() {
            core.traders.insert(trader.id, trader);
        }
        info!(count = core.traders.len(), "loaded traders");

        let instruments: Vec<String> = core.books.keys().cloned().collect();
        let mut trades = Vec::new();
        let mut liquidations = Vec::new();

        for instrument in &instruments {
            for position in store.positions_for_instrument(instrument) {
                core.positions
                    .insert((instrument.clone(), position.trader_id), position);
            }
            // Replay preserves created_at order, restoring time priority
            let open_orders = store.open_orders(instrument);
            let book = core.books.get_mut(instrument).expect("registered instrument");
            let mut restored = 0usize;
            for order in open_orders {
                if book.add(order) {
                    restored += 1;
                }
            }
            trades.extend(store.recent_trades(instrument, TRADE_RING_CAP));
            liquidations.extend(store.recent_liquidations(instrument, LIQUIDATION_RING_CAP));
            info!(%instrument, restored, "rebuilt order book");
        }

        trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        trades.truncate(TRADE_RING_CAP);
        core.recent_trades = trades;

        liquidations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        liquidations.truncate(LIQUIDATION_RING_CAP);
        core.recent_liquidations = liquidations;

        info!(
            positions = core.positions.len(),
            trades = core.recent_trades.len(),
            liquidations = core.recent_liquidations.len(),
            "engine state recovered"
        );
    }

    /// Force a snapshot of the backing store (shutdown checkpoint).
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        if let Some(store) = &self.store {
            store
                .snapshot(clock::now_nanos())
                .map_err(|e| EngineError::Persistence(e.to_string()))?;
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EngineCore> {
        self.inner.read().expect("engine lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EngineCore> {
        self.inner.write().expect("engine lock poisoned")
    }

    /// Store failures are logged, never propagated: the journal is the
    /// system of record and restart reconciles.
    fn persist(&self, records: Vec<StoreRecord>, timestamp: i64) {
        if let Some(store) = &self.store {
            if let Err(e) = store.apply_batch(&records, timestamp) {
                warn!(error = %e, "persistence failure");
            }
        }
    }

    fn compute_stats(&self, core: &EngineCore, instrument: &str, now: i64) -> MarketStats {
        let positions: Vec<Position> = core
            .positions
            .values()
            .filter(|p| p.instrument == instrument)
            .cloned()
            .collect();
        stats::market_stats(
            &core.recent_trades,
            &positions,
            instrument,
            self.starting_price,
            self.fund.balance(),
            now,
        )
    }

    fn persist_market_stats(&self, core: &EngineCore, instrument: &str, now: i64) {
        let stats = self.compute_stats(core, instrument, now);
        self.persist(vec![StoreRecord::MarketStatsUpserted(stats)], now);
    }
}

fn position_record(
    update: &ledger::PositionUpdate,
    trader_id: TraderId,
    instrument: &str,
) -> StoreRecord {
    match &update.position {
        Some(position) => StoreRecord::PositionUpserted(position.clone()),
        None => StoreRecord::PositionDeleted {
            trader_id,
            instrument: instrument.to_string(),
        },
    }
}

// ── Liquidation monitor seams ───────────────────────────────────────

impl PriceProvider for MatchingEngine {
    fn mark_price(&self, instrument: &str) -> Decimal {
        self.get_mark_price(instrument)
    }
}

impl PositionStore for MatchingEngine {
    fn open_positions(&self, instrument: &str) -> Vec<Position> {
        self.get_all_positions(instrument)
    }

    /// Forced close at mark: realize P&L, credit the trader margin + pnl,
    /// delete the position. Performed off-book — no trade is synthesized.
    fn close_position(
        &self,
        trader_id: TraderId,
        instrument: &str,
        mark_price: Decimal,
    ) -> Result<(), EngineError> {
        let now = clock::now_nanos();
        let mut core = self.write();

        let position = core
            .positions
            .remove(&(instrument.to_string(), trader_id))
            .ok_or(EngineError::NoPosition(trader_id))?;

        let pnl = position.unrealized_at(mark_price);
        let mut records = vec![StoreRecord::PositionDeleted {
            trader_id,
            instrument: instrument.to_string(),
        }];

        if let Some(trader) = core.traders.get_mut(&trader_id) {
            trader.balance += position.margin + pnl;
            trader.total_pnl += pnl;
            records.push(StoreRecord::TraderUpserted(trader.clone()));
        }
        self.persist(records, now);

        self.events.emit(EngineEvent::PositionClosed {
            trader_id,
            instrument: instrument.to_string(),
        });
        Ok(())
    }

    fn record_liquidation(&self, liquidation: Liquidation) {
        let now = clock::now_nanos();
        let mut core = self.write();
        core.recent_liquidations.insert(0, liquidation.clone());
        core.recent_liquidations.truncate(LIQUIDATION_RING_CAP);
        self.persist(
            vec![StoreRecord::LiquidationAppended(liquidation.clone())],
            now,
        );
        self.events.emit(EngineEvent::Liquidation(liquidation));
    }
}
