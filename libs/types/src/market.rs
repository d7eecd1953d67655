//! Market snapshot types: order-book levels, market stats, open interest

use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    /// Sum of remaining sizes of the resting orders at this level
    pub size: Quantity,
    pub order_count: usize,
}

/// Full order-book snapshot at a depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: String,
    /// Sorted high to low
    pub bids: Vec<BookLevel>,
    /// Sorted low to high
    pub asks: Vec<BookLevel>,
    pub timestamp: i64, // Unix nanos
}

/// Current market statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub instrument: String,
    pub last_price: Price,
    /// Last trade price; the liquidation monitor's authority
    pub mark_price: Price,
    pub high_24h: Price,
    pub low_24h: Price,
    /// Notional volume: Σ size × price over the last 24 h
    pub volume_24h: Decimal,
    /// Σ |size| over all non-flat positions
    pub open_interest: Decimal,
    pub insurance_fund: Decimal,
    pub timestamp: i64, // Unix nanos
}

/// Transparent open-interest breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestBreakdown {
    pub instrument: String,
    pub timestamp: i64, // Unix nanos
    pub total_oi: Decimal,
    pub long_positions: i64,
    pub short_positions: i64,
    /// Average leverage by side — public, per the transparency theme
    pub avg_long_leverage: Decimal,
    pub avg_short_leverage: Decimal,
}
