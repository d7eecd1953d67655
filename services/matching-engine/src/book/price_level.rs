//! Price level with FIFO queue
//!
//! A price level holds all resting orders at one price, in arrival order.
//! The running total always equals the sum of queued remaining sizes.

use std::collections::VecDeque;
use types::ids::{OrderId, TraderId};
use types::numeric::Quantity;

/// Entry in the price level queue
#[derive(Debug, Clone, Copy)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub trader_id: TraderId,
    pub remaining: Quantity,
}

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering for time-priority matching.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<LevelEntry>,
    total_size: Quantity,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_size: Quantity::zero(),
        }
    }

    /// Append an order at the back of the queue (time priority)
    pub fn push_back(&mut self, order_id: OrderId, trader_id: TraderId, remaining: Quantity) {
        self.orders.push_back(LevelEntry {
            order_id,
            trader_id,
            remaining,
        });
        self.total_size = self.total_size + remaining;
    }

    /// Remove an order from the queue by id
    ///
    /// Returns the remaining size of the removed order, or None if not found
    pub fn remove(&mut self, order_id: OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|e| e.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_size = Quantity::try_new(
            self.total_size.as_decimal() - entry.remaining.as_decimal(),
        )
        .unwrap_or(Quantity::zero());
        Some(entry.remaining)
    }

    /// Reduce an order's remaining size after a fill. The entry is removed
    /// when its remaining size reaches zero. Returns the new remaining size,
    /// or None if the order is not at this level.
    pub fn fill(&mut self, order_id: OrderId, fill: Quantity) -> Option<Quantity> {
        let position = self.orders.iter().position(|e| e.order_id == order_id)?;
        let entry = &mut self.orders[position];
        debug_assert!(fill.as_decimal() <= entry.remaining.as_decimal());

        let new_remaining = Quantity::try_new(
            entry.remaining.as_decimal() - fill.as_decimal(),
        )
        .unwrap_or(Quantity::zero());

        if new_remaining.is_zero() {
            self.orders.remove(position);
        } else {
            entry.remaining = new_remaining;
        }
        self.total_size = Quantity::try_new(
            self.total_size.as_decimal() - fill.as_decimal(),
        )
        .unwrap_or(Quantity::zero());

        Some(new_remaining)
    }

    /// Queue entries in FIFO order.
    pub fn entries(&self) -> impl Iterator<Item = &LevelEntry> {
        self.orders.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_size(&self) -> Quantity {
        self.total_size
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_back() {
        let mut level = PriceLevel::new();
        level.push_back(OrderId::new(), TraderId::new(), Quantity::from_str("1.5").unwrap());

        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_size(), Quantity::from_str("1.5").unwrap());
        assert!(!level.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut level = PriceLevel::new();
        let trader = TraderId::new();
        let order1 = OrderId::new();
        let order2 = OrderId::new();

        level.push_back(order1, trader, Quantity::from_u64(1));
        level.push_back(order2, trader, Quantity::from_u64(2));

        let ids: Vec<OrderId> = level.entries().map(|e| e.order_id).collect();
        assert_eq!(ids, vec![order1, order2]);
    }

    #[test]
    fn test_remove() {
        let mut level = PriceLevel::new();
        let trader = TraderId::new();
        let order1 = OrderId::new();
        let order2 = OrderId::new();

        level.push_back(order1, trader, Quantity::from_u64(1));
        level.push_back(order2, trader, Quantity::from_u64(2));

        let removed = level.remove(order1);
        assert_eq!(removed, Some(Quantity::from_u64(1)));
        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_size(), Quantity::from_u64(2));

        assert!(level.remove(order1).is_none());
    }

    #[test]
    fn test_partial_fill() {
        let mut level = PriceLevel::new();
        let order = OrderId::new();
        level.push_back(order, TraderId::new(), Quantity::from_u64(5));

        let remaining = level.fill(order, Quantity::from_u64(2)).unwrap();
        assert_eq!(remaining, Quantity::from_u64(3));
        assert_eq!(level.total_size(), Quantity::from_u64(3));
        assert_eq!(level.order_count(), 1);
    }

    #[test]
    fn test_complete_fill_removes_entry() {
        let mut level = PriceLevel::new();
        let order = OrderId::new();
        level.push_back(order, TraderId::new(), Quantity::from_u64(5));

        let remaining = level.fill(order, Quantity::from_u64(5)).unwrap();
        assert!(remaining.is_zero());
        assert!(level.is_empty());
        assert!(level.total_size().is_zero());
    }

    #[test]
    fn test_total_size_invariant() {
        let mut level = PriceLevel::new();
        let trader = TraderId::new();
        let a = OrderId::new();
        let b = OrderId::new();
        let c = OrderId::new();

        level.push_back(a, trader, Quantity::from_str("1.5").unwrap());
        level.push_back(b, trader, Quantity::from_str("2.5").unwrap());
        level.push_back(c, trader, Quantity::from_str("3.0").unwrap());
        level.fill(b, Quantity::from_str("0.5").unwrap());
        level.remove(a);

        let sum: rust_decimal::Decimal = level.entries().map(|e| e.remaining.as_decimal()).sum();
        assert_eq!(level.total_size().as_decimal(), sum);
        assert_eq!(level.order_count(), 2);
    }
}
