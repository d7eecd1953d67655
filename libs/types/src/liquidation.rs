//! Liquidation records and the insurance fund
//!
//! Liquidations are performed off-book against the insurance fund, so they
//! produce a `Liquidation` record rather than a `Trade`. The record — side,
//! size, leverage, loss — is fully public.

use crate::ids::{LiquidationId, TraderId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A forced position closure. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidation {
    pub id: LiquidationId,
    pub trader_id: TraderId,
    pub instrument: String,
    /// Side of the position that was closed: buy = long, sell = short
    pub side: Side,
    /// Size liquidated (always positive)
    pub size: Quantity,
    pub entry_price: Price,
    pub liquidation_price: Price,
    /// Mark price that triggered the close
    pub mark_price: Price,
    pub leverage: u32,
    /// Signed loss; positive means the trader lost that much
    pub loss: Decimal,
    /// Whether the insurance fund had to cover a shortfall
    pub insurance_fund_hit: bool,
    pub timestamp: i64, // Unix nanos
}

/// Insurance fund state snapshot
///
/// `total_in`/`total_out` only grow; `balance` never goes below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceFundState {
    pub balance: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub updated_at: i64, // Unix nanos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::R_INDEX;
    use rust_decimal_macros::dec;

    #[test]
    fn test_liquidation_serialization() {
        let liq = Liquidation {
            id: LiquidationId::new(),
            trader_id: TraderId::new(),
            instrument: R_INDEX.to_string(),
            side: Side::Buy,
            size: Quantity::from_u64(1),
            entry_price: Price::from_u64(100),
            liquidation_price: Price::from_str("99.02").unwrap(),
            mark_price: Price::from_u64(99),
            leverage: 100,
            loss: dec!(1),
            insurance_fund_hit: false,
            timestamp: 1,
        };

        let json = serde_json::to_string(&liq).unwrap();
        assert!(json.contains("\"side\":\"buy\""));
        assert!(json.contains("\"insurance_fund_hit\":false"));
        let back: Liquidation = serde_json::from_str(&json).unwrap();
        assert_eq!(liq, back);
    }
}
