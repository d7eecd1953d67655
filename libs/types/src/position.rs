//! Position tracking types
//!
//! A position is keyed by (trader, instrument). `size` is signed: positive is
//! long, negative is short. A flat position does not exist as a record — the
//! ledger deletes it the moment size reaches zero.

use crate::ids::TraderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Classification of how a fill affected a trader's position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionEffect {
    /// New position opened or an existing one extended
    Open,
    /// Position reduced or flipped voluntarily
    Close,
    /// Forced closure by the liquidation monitor
    Liquidation,
}

/// Leverage tier, determining maintenance margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeverageTier {
    /// 1-10x
    Conservative,
    /// 11-50x
    Moderate,
    /// 51-100x
    Aggressive,
    /// 101x and up
    Degen,
}

impl LeverageTier {
    /// Tier for a given leverage. The mapping is fixed; only the margin
    /// constants per tier are configuration.
    pub fn for_leverage(leverage: u32) -> Self {
        match leverage {
            0..=10 => LeverageTier::Conservative,
            11..=50 => LeverageTier::Moderate,
            51..=100 => LeverageTier::Aggressive,
            _ => LeverageTier::Degen,
        }
    }
}

/// A trader's current position — all fields public
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trader_id: TraderId,
    pub instrument: String,
    /// Positive = long, negative = short. Never zero for a stored record.
    pub size: Decimal,
    /// Weighted-average entry price
    pub entry_price: Decimal,
    pub leverage: u32,
    /// Margin backing the position (notional / leverage)
    pub margin: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    /// Where this position gets force-closed — public, like everything else
    pub liquidation_price: Decimal,
    pub updated_at: i64, // Unix nanos
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// Notional value at entry
    pub fn notional(&self) -> Decimal {
        self.size.abs() * self.entry_price
    }

    pub fn tier(&self) -> LeverageTier {
        LeverageTier::for_leverage(self.leverage)
    }

    /// Unrealized P&L at the given mark price.
    ///
    /// Long: (mark − entry) × size. Short: (entry − mark) × |size|.
    pub fn unrealized_at(&self, mark_price: Decimal) -> Decimal {
        if self.is_long() {
            (mark_price - self.entry_price) * self.size
        } else {
            (self.entry_price - mark_price) * self.size.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::R_INDEX;
    use rust_decimal_macros::dec;

    fn long_position() -> Position {
        Position {
            trader_id: TraderId::new(),
            instrument: R_INDEX.to_string(),
            size: dec!(2),
            entry_price: dec!(100),
            leverage: 10,
            margin: dec!(20),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            liquidation_price: dec!(90.05),
            updated_at: 1,
        }
    }

    #[test]
    fn test_tier_mapping() {
        assert_eq!(LeverageTier::for_leverage(1), LeverageTier::Conservative);
        assert_eq!(LeverageTier::for_leverage(10), LeverageTier::Conservative);
        assert_eq!(LeverageTier::for_leverage(11), LeverageTier::Moderate);
        assert_eq!(LeverageTier::for_leverage(50), LeverageTier::Moderate);
        assert_eq!(LeverageTier::for_leverage(100), LeverageTier::Aggressive);
        assert_eq!(LeverageTier::for_leverage(150), LeverageTier::Degen);
    }

    #[test]
    fn test_long_short() {
        let mut pos = long_position();
        assert!(pos.is_long());
        pos.size = dec!(-2);
        assert!(pos.is_short());
    }

    #[test]
    fn test_unrealized_long() {
        let pos = long_position();
        assert_eq!(pos.unrealized_at(dec!(110)), dec!(20));
        assert_eq!(pos.unrealized_at(dec!(95)), dec!(-10));
    }

    #[test]
    fn test_unrealized_short() {
        let mut pos = long_position();
        pos.size = dec!(-2);
        assert_eq!(pos.unrealized_at(dec!(90)), dec!(20));
        assert_eq!(pos.unrealized_at(dec!(105)), dec!(-10));
    }

    #[test]
    fn test_notional() {
        let pos = long_position();
        assert_eq!(pos.notional(), dec!(200));
    }

    #[test]
    fn test_effect_serialization() {
        assert_eq!(
            serde_json::to_string(&PositionEffect::Liquidation).unwrap(),
            "\"liquidation\""
        );
    }
}
