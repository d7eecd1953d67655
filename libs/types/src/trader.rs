//! Market participants
//!
//! Traders are created by the authentication collaborator; the kernel only
//! mutates their trading stats (balance, P&L, trade count, leverage
//! high-water mark). All of these fields are public by design of the
//! exchange: every participant's record is a queryable object.

use crate::ids::TraderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderType {
    Human,
    Bot,
    MarketMaker,
}

/// A market participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trader {
    pub id: TraderId,
    pub username: String,
    #[serde(rename = "type")]
    pub trader_type: TraderType,
    /// Available balance
    pub balance: Decimal,
    /// Cumulative realized P&L
    pub total_pnl: Decimal,
    pub trade_count: i64,
    /// Highest leverage ever used. Monotonically non-decreasing.
    pub max_leverage_used: u32,
    pub created_at: i64, // Unix nanos
}

impl Trader {
    /// Create a new trader with a starting balance
    pub fn new(
        username: impl Into<String>,
        trader_type: TraderType,
        balance: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            id: TraderId::new(),
            username: username.into(),
            trader_type,
            balance,
            total_pnl: Decimal::ZERO,
            trade_count: 0,
            max_leverage_used: 0,
            created_at: timestamp,
        }
    }

    /// Record participation in a trade: bump the trade count and raise the
    /// leverage high-water mark.
    pub fn record_trade(&mut self, leverage: u32) {
        self.trade_count += 1;
        if leverage > self.max_leverage_used {
            self.max_leverage_used = leverage;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trader_creation() {
        let trader = Trader::new("alice", TraderType::Human, Decimal::from(10_000), 1);
        assert_eq!(trader.username, "alice");
        assert_eq!(trader.trade_count, 0);
        assert_eq!(trader.max_leverage_used, 0);
        assert_eq!(trader.total_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_record_trade_raises_leverage_watermark() {
        let mut trader = Trader::new("bob", TraderType::Bot, Decimal::from(10_000), 1);
        trader.record_trade(50);
        trader.record_trade(10);
        assert_eq!(trader.trade_count, 2);
        // Never lowered
        assert_eq!(trader.max_leverage_used, 50);
    }

    #[test]
    fn test_trader_type_serialization() {
        assert_eq!(
            serde_json::to_string(&TraderType::MarketMaker).unwrap(),
            "\"market_maker\""
        );
        assert_eq!(serde_json::to_string(&TraderType::Human).unwrap(), "\"human\"");
    }
}
