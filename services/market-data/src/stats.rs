//! Market statistics and open interest
//!
//! Derivations over the newest-first trade ring and the live position set.
//! Mark price is the last trade price, falling back to the configured
//! starting price before any trade exists. The order-book mid is never used
//! here: a single tiny quote must not move the liquidation trigger.

use rust_decimal::Decimal;
use types::market::{MarketStats, OpenInterestBreakdown};
use types::numeric::Price;
use types::position::Position;
use types::trade::Trade;

const DAY_NANOS: i64 = 24 * 3600 * 1_000_000_000;

/// Compute market stats for an instrument.
///
/// `trades` is newest first. `fallback_price` is the configured starting
/// price, used until the first trade.
pub fn market_stats(
    trades: &[Trade],
    positions: &[Position],
    instrument: &str,
    fallback_price: Price,
    insurance_fund: Decimal,
    now: i64,
) -> MarketStats {
    let last_price = trades
        .iter()
        .find(|t| t.instrument == instrument)
        .map(|t| t.price)
        .unwrap_or(fallback_price);

    let mut high_24h = last_price;
    let mut low_24h = last_price;
    let mut volume_24h = Decimal::ZERO;
    let day_ago = now - DAY_NANOS;

    for trade in trades {
        if trade.instrument != instrument || trade.timestamp <= day_ago {
            continue;
        }
        if trade.price > high_24h {
            high_24h = trade.price;
        }
        if trade.price < low_24h {
            low_24h = trade.price;
        }
        volume_24h += trade.notional();
    }

    let open_interest = positions
        .iter()
        .filter(|p| p.instrument == instrument)
        .map(|p| p.size.abs())
        .sum();

    MarketStats {
        instrument: instrument.to_string(),
        last_price,
        mark_price: last_price,
        high_24h,
        low_24h,
        volume_24h,
        open_interest,
        insurance_fund,
        timestamp: now,
    }
}

/// Transparent open-interest breakdown: totals, counts, and average
/// leverage per side.
pub fn open_interest(positions: &[Position], instrument: &str, now: i64) -> OpenInterestBreakdown {
    let mut breakdown = OpenInterestBreakdown {
        instrument: instrument.to_string(),
        timestamp: now,
        total_oi: Decimal::ZERO,
        long_positions: 0,
        short_positions: 0,
        avg_long_leverage: Decimal::ZERO,
        avg_short_leverage: Decimal::ZERO,
    };

    let mut long_leverage_sum = Decimal::ZERO;
    let mut short_leverage_sum = Decimal::ZERO;

    for position in positions {
        if position.instrument != instrument || position.size.is_zero() {
            continue;
        }
        breakdown.total_oi += position.size.abs();
        if position.is_long() {
            breakdown.long_positions += 1;
            long_leverage_sum += Decimal::from(position.leverage);
        } else {
            breakdown.short_positions += 1;
            short_leverage_sum += Decimal::from(position.leverage);
        }
    }

    if breakdown.long_positions > 0 {
        breakdown.avg_long_leverage = long_leverage_sum / Decimal::from(breakdown.long_positions);
    }
    if breakdown.short_positions > 0 {
        breakdown.avg_short_leverage =
            short_leverage_sum / Decimal::from(breakdown.short_positions);
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::ids::{OrderId, TradeId, TraderId};
    use types::numeric::Quantity;
    use types::order::Side;
    use types::position::PositionEffect;
    use types::R_INDEX;

    fn trade(price: u64, size: u64, timestamp: i64) -> Trade {
        Trade {
            id: TradeId::new(),
            instrument: R_INDEX.to_string(),
            price: Price::from_u64(price),
            size: Quantity::from_u64(size),
            timestamp,
            buyer_id: TraderId::new(),
            seller_id: TraderId::new(),
            buyer_order_id: OrderId::new(),
            seller_order_id: OrderId::new(),
            buyer_leverage: 10,
            seller_leverage: 10,
            buyer_effect: PositionEffect::Open,
            seller_effect: PositionEffect::Open,
            buyer_new_position: Decimal::from(size),
            seller_new_position: -Decimal::from(size),
            aggressor_side: Side::Buy,
        }
    }

    fn position(size: Decimal, leverage: u32) -> Position {
        Position {
            trader_id: TraderId::new(),
            instrument: R_INDEX.to_string(),
            size,
            entry_price: dec!(100),
            leverage,
            margin: dec!(10),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            liquidation_price: dec!(90),
            updated_at: 1,
        }
    }

    #[test]
    fn test_stats_no_trades_uses_fallback() {
        let stats = market_stats(&[], &[], R_INDEX, Price::from_u64(1000), dec!(1000000), 1);
        assert_eq!(stats.last_price, Price::from_u64(1000));
        assert_eq!(stats.mark_price, Price::from_u64(1000));
        assert_eq!(stats.volume_24h, Decimal::ZERO);
    }

    #[test]
    fn test_stats_last_and_range() {
        let now = 2 * DAY_NANOS;
        // Newest first
        let trades = vec![
            trade(105, 1, now - 1000),
            trade(120, 2, now - 2000),
            trade(95, 1, now - 3000),
            // Outside the 24 h window
            trade(500, 9, now - DAY_NANOS - 1),
        ];

        let stats = market_stats(&trades, &[], R_INDEX, Price::from_u64(1000), dec!(0), now);
        assert_eq!(stats.last_price, Price::from_u64(105));
        assert_eq!(stats.high_24h, Price::from_u64(120));
        assert_eq!(stats.low_24h, Price::from_u64(95));
        // 105*1 + 120*2 + 95*1 = 440
        assert_eq!(stats.volume_24h, dec!(440));
    }

    #[test]
    fn test_stats_open_interest() {
        let positions = vec![position(dec!(2), 10), position(dec!(-3), 50)];
        let stats = market_stats(&[], &positions, R_INDEX, Price::from_u64(1000), dec!(0), 1);
        assert_eq!(stats.open_interest, dec!(5));
    }

    #[test]
    fn test_open_interest_breakdown() {
        let positions = vec![
            position(dec!(2), 10),
            position(dec!(1), 30),
            position(dec!(-3), 100),
        ];

        let oi = open_interest(&positions, R_INDEX, 1);
        assert_eq!(oi.total_oi, dec!(6));
        assert_eq!(oi.long_positions, 2);
        assert_eq!(oi.short_positions, 1);
        assert_eq!(oi.avg_long_leverage, dec!(20));
        assert_eq!(oi.avg_short_leverage, dec!(100));
    }

    #[test]
    fn test_open_interest_empty() {
        let oi = open_interest(&[], R_INDEX, 1);
        assert_eq!(oi.total_oi, Decimal::ZERO);
        assert_eq!(oi.avg_long_leverage, Decimal::ZERO);
    }
}
