//! Position ledger arithmetic
//!
//! Applies a signed size delta at a trade price to a (possibly absent)
//! position. Three regimes:
//!
//! 1. Opening (flat, or delta has the position's sign): weighted-average
//!    entry, nothing realized.
//! 2. Reducing (opposite sign, no overshoot): realize P&L on the closed
//!    size, entry unchanged.
//! 3. Flipping (opposite sign, overshoot): realize on the full old size,
//!    then the residual opens at the trade price with the order's leverage.
//!
//! A zero result deletes the position. Margin is notional / leverage and
//! the liquidation price is recomputed on every mutation.

use risk_engine::liquidation::liquidation_price;
use risk_engine::margin::required_margin;
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use types::config::MaintenanceMargins;
use types::ids::TraderId;
use types::position::{Position, PositionEffect};

/// Result of applying a delta to a position.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    /// The position after the fill; None when it closed out flat
    pub position: Option<Position>,
    /// Signed size after the fill (zero when flat)
    pub new_size: Decimal,
    /// P&L realized by this fill (zero when purely opening)
    pub realized_delta: Decimal,
    pub effect: PositionEffect,
}

/// Classify what a delta does to a position: open if flat or extending,
/// close if reducing or flipping.
pub fn classify_effect(existing: Option<&Position>, delta: Decimal) -> PositionEffect {
    match existing {
        None => PositionEffect::Open,
        Some(pos) if pos.size.is_zero() => PositionEffect::Open,
        Some(pos) => {
            if pos.size.signum() == delta.signum() {
                PositionEffect::Open
            } else {
                PositionEffect::Close
            }
        }
    }
}

/// Apply `delta` at `price`. `order_leverage` is adopted when opening from
/// flat or flipping; an existing position keeps its leverage when extended
/// or reduced.
#[allow(clippy::too_many_arguments)]
pub fn apply_delta(
    existing: Option<&Position>,
    trader_id: TraderId,
    instrument: &str,
    delta: Decimal,
    price: Decimal,
    order_leverage: u32,
    margins: &MaintenanceMargins,
    timestamp: i64,
) -> PositionUpdate {
    debug_assert!(!delta.is_zero());
    let effect = classify_effect(existing, delta);

    let old_size = existing.map(|p| p.size).unwrap_or(Decimal::ZERO);
    let old_entry = existing.map(|p| p.entry_price).unwrap_or(Decimal::ZERO);
    let old_realized = existing.map(|p| p.realized_pnl).unwrap_or(Decimal::ZERO);
    let old_leverage = existing.map(|p| p.leverage).unwrap_or(order_leverage);

    let new_size = old_size + delta;
    let mut realized_delta = Decimal::ZERO;
    let mut entry_price = old_entry;
    let mut leverage = old_leverage;

    if old_size.is_zero() {
        // Opening from flat
        entry_price = price;
        leverage = order_leverage;
    } else if old_size.signum() == delta.signum() {
        // Extending: weighted-average entry, leverage kept
        entry_price = (old_size * old_entry + delta * price) / new_size;
    } else {
        // Reducing: realize on the closed size
        let closed = old_size.abs().min(delta.abs());
        realized_delta = if old_size > Decimal::ZERO {
            (price - old_entry) * closed
        } else {
            (old_entry - price) * closed
        };

        let flipped = !new_size.is_zero() && new_size.signum() != old_size.signum();
        if flipped {
            // The residual is a fresh position at the fill price
            entry_price = price;
            leverage = order_leverage;
        }
    }

    if new_size.is_zero() {
        return PositionUpdate {
            position: None,
            new_size,
            realized_delta,
            effect,
        };
    }

    let margin = required_margin(new_size, entry_price, leverage);
    let liq_price = liquidation_price(entry_price, leverage, new_size > Decimal::ZERO, margins);
    let unrealized = if new_size > Decimal::ZERO {
        (price - entry_price) * new_size
    } else {
        (entry_price - price) * new_size.abs()
    };

    PositionUpdate {
        position: Some(Position {
            trader_id,
            instrument: instrument.to_string(),
            size: new_size,
            entry_price,
            leverage,
            margin,
            unrealized_pnl: unrealized,
            realized_pnl: old_realized + realized_delta,
            liquidation_price: liq_price,
            updated_at: timestamp,
        }),
        new_size,
        realized_delta,
        effect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::config::KernelConfig;
    use types::R_INDEX;

    fn margins() -> MaintenanceMargins {
        KernelConfig::default().liquidation.maintenance_margins
    }

    fn apply(
        existing: Option<&Position>,
        delta: Decimal,
        price: Decimal,
        leverage: u32,
    ) -> PositionUpdate {
        let trader_id = existing.map(|p| p.trader_id).unwrap_or_default();
        apply_delta(
            existing,
            trader_id,
            R_INDEX,
            delta,
            price,
            leverage,
            &margins(),
            1,
        )
    }

    #[test]
    fn test_open_from_flat() {
        let update = apply(None, dec!(2), dec!(100), 10);
        assert_eq!(update.effect, PositionEffect::Open);
        assert_eq!(update.new_size, dec!(2));
        assert_eq!(update.realized_delta, Decimal::ZERO);

        let pos = update.position.unwrap();
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.leverage, 10);
        assert_eq!(pos.margin, dec!(20));
        assert!(pos.liquidation_price < dec!(100));
    }

    #[test]
    fn test_open_short_from_flat() {
        let update = apply(None, dec!(-3), dec!(100), 20);
        let pos = update.position.unwrap();
        assert_eq!(pos.size, dec!(-3));
        assert_eq!(pos.entry_price, dec!(100));
        assert!(pos.liquidation_price > dec!(100));
    }

    #[test]
    fn test_extend_weighted_average() {
        let first = apply(None, dec!(1), dec!(100), 10).position.unwrap();
        let update = apply(Some(&first), dec!(1), dec!(110), 25);
        assert_eq!(update.effect, PositionEffect::Open);

        let pos = update.position.unwrap();
        assert_eq!(pos.size, dec!(2));
        assert_eq!(pos.entry_price, dec!(105));
        // Adding keeps the position's leverage, not the order's
        assert_eq!(pos.leverage, 10);
        assert_eq!(update.realized_delta, Decimal::ZERO);
    }

    #[test]
    fn test_extend_short_weighted_average() {
        let first = apply(None, dec!(-1), dec!(100), 10).position.unwrap();
        let pos = apply(Some(&first), dec!(-1), dec!(90), 10).position.unwrap();
        assert_eq!(pos.size, dec!(-2));
        assert_eq!(pos.entry_price, dec!(95));
    }

    #[test]
    fn test_reduce_realizes_pnl() {
        let long = apply(None, dec!(2), dec!(100), 10).position.unwrap();
        let update = apply(Some(&long), dec!(-1), dec!(110), 10);

        assert_eq!(update.effect, PositionEffect::Close);
        assert_eq!(update.realized_delta, dec!(10));

        let pos = update.position.unwrap();
        assert_eq!(pos.size, dec!(1));
        // Entry unchanged on a reduce
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.realized_pnl, dec!(10));
    }

    #[test]
    fn test_reduce_short_realizes_pnl() {
        let short = apply(None, dec!(-2), dec!(100), 10).position.unwrap();
        let update = apply(Some(&short), dec!(1), dec!(90), 10);
        // Short profits when buying back below entry
        assert_eq!(update.realized_delta, dec!(10));
        assert_eq!(update.position.unwrap().size, dec!(-1));
    }

    #[test]
    fn test_full_close_deletes_position() {
        let long = apply(None, dec!(2), dec!(100), 10).position.unwrap();
        let update = apply(Some(&long), dec!(-2), dec!(95), 10);

        assert_eq!(update.effect, PositionEffect::Close);
        assert_eq!(update.realized_delta, dec!(-10));
        assert!(update.position.is_none());
        assert_eq!(update.new_size, Decimal::ZERO);
    }

    #[test]
    fn test_flip_realizes_then_resets_entry() {
        // Long 2 @ 100, sell 3 @ 110: realize (110-100)*2 = 20, short 1 @ 110
        let long = apply(None, dec!(2), dec!(100), 10).position.unwrap();
        let update = apply(Some(&long), dec!(-3), dec!(110), 50);

        assert_eq!(update.effect, PositionEffect::Close);
        assert_eq!(update.realized_delta, dec!(20));

        let pos = update.position.unwrap();
        assert_eq!(pos.size, dec!(-1));
        // Post-flip entry equals the fill price
        assert_eq!(pos.entry_price, dec!(110));
        // The flipping order's leverage is adopted for the residual
        assert_eq!(pos.leverage, 50);
        assert_eq!(pos.realized_pnl, dec!(20));
    }

    #[test]
    fn test_classify_effect() {
        assert_eq!(classify_effect(None, dec!(1)), PositionEffect::Open);

        let long = apply(None, dec!(2), dec!(100), 10).position.unwrap();
        assert_eq!(classify_effect(Some(&long), dec!(1)), PositionEffect::Open);
        assert_eq!(classify_effect(Some(&long), dec!(-1)), PositionEffect::Close);
    }

    #[test]
    fn test_margin_tracks_size_and_leverage() {
        // 1 @ 100 at 100x -> margin 1 (the aggressive-tier example)
        let pos = apply(None, dec!(1), dec!(100), 100).position.unwrap();
        assert_eq!(pos.margin, dec!(1));
        assert_eq!(pos.liquidation_price, dec!(99.02));
    }
}
