//! Ask (sell-side) order book
//!
//! Sell orders indexed by price. The best ask is the lowest price; crosses
//! are enumerated low-to-high. Uses BTreeMap for deterministic iteration.

use std::collections::BTreeMap;
use types::ids::{OrderId, TraderId};
use types::market::BookLevel;
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};

/// Ask (sell) side of the book
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert a resting order at its price level, creating the level if
    /// absent.
    pub fn insert(&mut self, order_id: OrderId, trader_id: TraderId, price: Price, remaining: Quantity) {
        self.levels
            .entry(price)
            .or_default()
            .push_back(order_id, trader_id, remaining);
    }

    /// Remove an order. Empty levels are dropped.
    pub fn remove(&mut self, order_id: OrderId, price: Price) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Reduce an order's remaining size after a fill, dropping the level if
    /// it empties. Returns the order's new remaining size.
    pub fn apply_fill(&mut self, order_id: OrderId, price: Price, fill: Quantity) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let remaining = level.fill(order_id, fill)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(remaining)
    }

    /// Best ask: lowest price and its aggregate size.
    pub fn best(&self) -> Option<(Price, Quantity)> {
        self.levels
            .iter()
            .next()
            .map(|(price, level)| (*price, level.total_size()))
    }

    /// Prices that cross a buy at `limit`, best (lowest) first.
    /// `None` means a market buy: every level crosses.
    pub fn crossable_prices(&self, limit: Option<Price>) -> Vec<Price> {
        self.levels
            .keys()
            .copied()
            .take_while(|price| match limit {
                Some(limit) => *price <= limit,
                None => true,
            })
            .collect()
    }

    /// FIFO queue entries at a price level.
    pub fn entries_at(&self, price: Price) -> Vec<LevelEntry> {
        self.levels
            .get(&price)
            .map(|level| level.entries().copied().collect())
            .unwrap_or_default()
    }

    /// Top `depth` levels, lowest price first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<BookLevel> {
        self.levels
            .iter()
            .take(depth)
            .map(|(price, level)| BookLevel {
                price: *price,
                size: level.total_size(),
                order_count: level.order_count(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_order(book: &mut AskBook, price: u64, size: u64) -> OrderId {
        let id = OrderId::new();
        book.insert(id, TraderId::new(), Price::from_u64(price), Quantity::from_u64(size));
        id
    }

    #[test]
    fn test_best_ask_is_lowest() {
        let mut book = AskBook::new();
        insert_order(&mut book, 100, 1);
        insert_order(&mut book, 98, 2);
        insert_order(&mut book, 103, 3);

        let (price, size) = book.best().unwrap();
        assert_eq!(price, Price::from_u64(98));
        assert_eq!(size, Quantity::from_u64(2));
    }

    #[test]
    fn test_crossable_prices_ascending() {
        let mut book = AskBook::new();
        insert_order(&mut book, 100, 1);
        insert_order(&mut book, 98, 1);
        insert_order(&mut book, 103, 1);

        // Buy limit 100 crosses 98 and 100, best first
        let prices = book.crossable_prices(Some(Price::from_u64(100)));
        assert_eq!(prices, vec![Price::from_u64(98), Price::from_u64(100)]);

        // Market buy crosses everything
        let all = book.crossable_prices(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], Price::from_u64(98));
    }

    #[test]
    fn test_depth_snapshot() {
        let mut book = AskBook::new();
        insert_order(&mut book, 100, 1);
        insert_order(&mut book, 98, 2);
        insert_order(&mut book, 103, 3);

        let depth = book.depth_snapshot(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].price, Price::from_u64(98));
        assert_eq!(depth[1].price, Price::from_u64(100));
    }

    #[test]
    fn test_remove_drops_empty_level() {
        let mut book = AskBook::new();
        let id = insert_order(&mut book, 100, 1);
        book.remove(id, Price::from_u64(100)).unwrap();
        assert!(book.is_empty());
    }
}
