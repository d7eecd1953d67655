//! Order book for one instrument
//!
//! Two price-indexed sides plus an order-id index holding the full resting
//! orders. No order ever rests on both sides; every order in the index has
//! status pending or partial and a positive remaining size.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{LevelEntry, PriceLevel};

use std::collections::HashMap;
use types::ids::OrderId;
use types::market::BookSnapshot;
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

/// Order book for a single instrument
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    instrument: String,
    bids: BidBook,
    asks: AskBook,
    /// Resting orders by id; the removal index
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Rest an order in the book. Returns false for orders without a price
    /// (market orders never rest).
    pub fn add(&mut self, order: Order) -> bool {
        let Some(price) = order.price else {
            return false;
        };
        let remaining = order.remaining_size();
        match order.side {
            Side::Buy => self.bids.insert(order.id, order.trader_id, price, remaining),
            Side::Sell => self.asks.insert(order.id, order.trader_id, price, remaining),
        }
        self.orders.insert(order.id, order);
        true
    }

    /// Unlink an order from its level and the index.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&order_id)?;
        let price = order.price?;
        match order.side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        };
        Some(order)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Apply a fill to a resting order: bump its filled size, shrink its
    /// level, and unlink it if fully filled. Returns the updated order.
    pub fn apply_fill(&mut self, order_id: OrderId, fill: Quantity, timestamp: i64) -> Option<Order> {
        let order = self.orders.get_mut(&order_id)?;
        let price = order.price?;
        order.add_fill(fill, timestamp);
        let side = order.side;
        let updated = order.clone();

        match side {
            Side::Buy => self.bids.apply_fill(order_id, price, fill),
            Side::Sell => self.asks.apply_fill(order_id, price, fill),
        };
        if updated.is_filled() {
            self.orders.remove(&order_id);
        }
        Some(updated)
    }

    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.best()
    }

    /// Opposite-side prices an aggressor crosses, best first. `limit` is
    /// None for market orders.
    pub fn crossable_prices(&self, aggressor_side: Side, limit: Option<Price>) -> Vec<Price> {
        match aggressor_side {
            Side::Buy => self.asks.crossable_prices(limit),
            Side::Sell => self.bids.crossable_prices(limit),
        }
    }

    /// FIFO queue at an opposite-side level.
    pub fn opposite_entries_at(&self, aggressor_side: Side, price: Price) -> Vec<LevelEntry> {
        match aggressor_side {
            Side::Buy => self.asks.entries_at(price),
            Side::Sell => self.bids.entries_at(price),
        }
    }

    /// Top-`depth` levels of each side.
    pub fn snapshot(&self, depth: usize, timestamp: i64) -> BookSnapshot {
        BookSnapshot {
            instrument: self.instrument.clone(),
            bids: self.bids.depth_snapshot(depth),
            asks: self.asks.depth_snapshot(depth),
            timestamp,
        }
    }

    /// Number of resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
