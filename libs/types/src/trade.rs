//! Immutable trade records
//!
//! A trade is the core transparency object: both parties, both leverages,
//! what the fill did to each side's position, and the resulting position
//! sizes are all public.

use crate::ids::{OrderId, TradeId, TraderId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use crate::position::PositionEffect;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An executed trade. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: String,
    pub price: Price,
    pub size: Quantity,
    pub timestamp: i64, // Unix nanos

    // Both sides are always visible
    pub buyer_id: TraderId,
    pub seller_id: TraderId,
    pub buyer_order_id: OrderId,
    pub seller_order_id: OrderId,

    // Leverage used by each side
    pub buyer_leverage: u32,
    pub seller_leverage: u32,

    // What happened to each trader's position
    pub buyer_effect: PositionEffect,
    pub seller_effect: PositionEffect,

    // New position sizes after this trade
    pub buyer_new_position: Decimal,
    pub seller_new_position: Decimal,

    /// Who took liquidity
    pub aggressor_side: Side,
}

impl Trade {
    /// Notional value (price × size)
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }

    /// Whether the given trader was on either side of this trade
    pub fn involves(&self, trader_id: TraderId) -> bool {
        self.buyer_id == trader_id || self.seller_id == trader_id
    }

    /// A trade can never have the same trader on both sides.
    pub fn validate_no_self_trade(&self) -> bool {
        self.buyer_id != self.seller_id
    }
}
