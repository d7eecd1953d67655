//! Liquidation threshold calculations
//!
//! The liquidation price sits one leveraged move (less the maintenance
//! margin) away from entry:
//!
//! ```text
//! distance  = entry_price / leverage · (1 − maint_margin)
//! liq_price = entry_price − distance   (long)
//!             entry_price + distance   (short)
//! ```
//!
//! Higher leverage means a smaller distance; the maintenance margin pulls
//! the trigger slightly before the margin is fully consumed.

use rust_decimal::Decimal;
use types::config::MaintenanceMargins;
use types::position::Position;

/// Liquidation price for a position with the given entry and leverage.
pub fn liquidation_price(
    entry_price: Decimal,
    leverage: u32,
    is_long: bool,
    margins: &MaintenanceMargins,
) -> Decimal {
    assert!(leverage >= 1, "leverage must be at least 1");
    let maint_margin = margins.margin_for_leverage(leverage);
    let distance = entry_price / Decimal::from(leverage) * (Decimal::ONE - maint_margin);

    if is_long {
        entry_price - distance
    } else {
        entry_price + distance
    }
}

/// Whether the mark price has crossed the position's liquidation threshold.
///
/// Long: mark ≤ liq price. Short: mark ≥ liq price.
pub fn should_liquidate(position: &Position, mark_price: Decimal) -> bool {
    if position.size.is_zero() {
        return false;
    }
    if position.is_long() {
        mark_price <= position.liquidation_price
    } else {
        mark_price >= position.liquidation_price
    }
}

/// Signed loss when force-closing at mark. Positive means the trader lost.
///
/// Long: (entry − mark) × size. Short: (mark − entry) × |size|.
pub fn loss_at_mark(position: &Position, mark_price: Decimal) -> Decimal {
    if position.is_long() {
        (position.entry_price - mark_price) * position.size
    } else {
        (mark_price - position.entry_price) * position.size.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::config::KernelConfig;
    use types::ids::TraderId;
    use types::R_INDEX;

    fn margins() -> MaintenanceMargins {
        KernelConfig::default().liquidation.maintenance_margins
    }

    fn position(size: Decimal, entry: Decimal, leverage: u32) -> Position {
        let liq = liquidation_price(entry, leverage, size > Decimal::ZERO, &margins());
        Position {
            trader_id: TraderId::new(),
            instrument: R_INDEX.to_string(),
            size,
            entry_price: entry,
            leverage,
            margin: entry * size.abs() / Decimal::from(leverage),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            liquidation_price: liq,
            updated_at: 1,
        }
    }

    #[test]
    fn test_liquidation_price_long_aggressive_tier() {
        // Entry 100 at 100x: aggressive tier, maint margin 2%
        // distance = 100/100 * 0.98 = 0.98 -> liq = 99.02
        let lp = liquidation_price(dec!(100), 100, true, &margins());
        assert_eq!(lp, dec!(99.02));
    }

    #[test]
    fn test_liquidation_price_short() {
        let lp = liquidation_price(dec!(100), 100, false, &margins());
        assert_eq!(lp, dec!(100.98));
    }

    #[test]
    fn test_liquidation_price_conservative_tier() {
        // Entry 1000 at 10x: distance = 100 * 0.995 = 99.5
        let lp = liquidation_price(dec!(1000), 10, true, &margins());
        assert_eq!(lp, dec!(900.5));
    }

    #[test]
    fn test_liquidation_price_sign() {
        // liq < entry for longs, liq > entry for shorts, every tier
        for leverage in [1u32, 10, 11, 50, 51, 100, 101, 150] {
            let long = liquidation_price(dec!(500), leverage, true, &margins());
            let short = liquidation_price(dec!(500), leverage, false, &margins());
            assert!(long < dec!(500), "leverage {}", leverage);
            assert!(short > dec!(500), "leverage {}", leverage);
        }
    }

    #[test]
    fn test_should_liquidate_long() {
        let pos = position(dec!(1), dec!(100), 100); // liq 99.02
        assert!(!should_liquidate(&pos, dec!(99.03)));
        assert!(should_liquidate(&pos, dec!(99.02)));
        assert!(should_liquidate(&pos, dec!(99)));
    }

    #[test]
    fn test_should_liquidate_short() {
        let pos = position(dec!(-1), dec!(100), 100); // liq 100.98
        assert!(!should_liquidate(&pos, dec!(100.97)));
        assert!(should_liquidate(&pos, dec!(100.98)));
        assert!(should_liquidate(&pos, dec!(101)));
    }

    #[test]
    fn test_loss_at_mark() {
        let long = position(dec!(1), dec!(100), 100);
        assert_eq!(loss_at_mark(&long, dec!(99)), dec!(1));
        // A profitable close is a negative loss
        assert_eq!(loss_at_mark(&long, dec!(101)), dec!(-1));

        let short = position(dec!(-2), dec!(100), 100);
        assert_eq!(loss_at_mark(&short, dec!(101)), dec!(2));
    }
}
