//! Order lifecycle types
//!
//! An order is created by submission, mutated by matching (filled size grows)
//! or by cancellation, and ends in a terminal status (filled or cancelled).
//! A resting order in the book is always pending or partial.

use crate::ids::{OrderId, TraderId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Rest at a limit price if not immediately matched
    Limit,
    /// Match against whatever is on the book; never rests
    Market,
}

/// Order status
///
/// `Filled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted, no fills yet
    Pending,
    /// Partially matched
    Partial,
    /// Completely matched (terminal)
    Filled,
    /// Cancelled by the trader or by the engine (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// A trading order
///
/// `price` is `None` for market orders. The leverage on the order is public,
/// like everything else on this exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub trader_id: TraderId,
    pub instrument: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub size: Quantity,
    pub filled_size: Quantity,
    pub leverage: u32,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Create a new pending order
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trader_id: TraderId,
        instrument: impl Into<String>,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        size: Quantity,
        leverage: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            trader_id,
            instrument: instrument.into(),
            side,
            order_type,
            price,
            size,
            filled_size: Quantity::zero(),
            leverage,
            status: OrderStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Unfilled quantity
    pub fn remaining_size(&self) -> Quantity {
        self.size - self.filled_size
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_size == self.size
    }

    /// Check if order has any fills
    pub fn has_fills(&self) -> bool {
        !self.filled_size.is_zero()
    }

    /// Record a fill and adjust status
    ///
    /// # Panics
    /// Panics if the fill would exceed the order size
    pub fn add_fill(&mut self, fill: Quantity, timestamp: i64) {
        let new_filled = self.filled_size + fill;
        assert!(
            new_filled.as_decimal() <= self.size.as_decimal(),
            "Fill would exceed order size"
        );

        self.filled_size = new_filled;
        if self.is_filled() {
            self.status = OrderStatus::Filled;
        } else if self.has_fills() {
            self.status = OrderStatus::Partial;
        }
        self.updated_at = timestamp;
    }

    /// Cancel the order
    ///
    /// # Panics
    /// Panics if the order is already terminal
    pub fn cancel(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "Cannot cancel terminal order");
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }
}
