//! OHLCV candles
//!
//! Trades are bucketed by truncating their timestamp to the interval
//! boundary in UTC; daily candles align to 00:00 UTC. The bucket `open` is
//! the price of the trade with the minimum timestamp in the bucket and
//! `close` the maximum — never an artifact of iteration order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::clock::NANOS_PER_SECOND;
use types::numeric::Price;
use types::trade::Trade;

/// Supported candle intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl CandleInterval {
    /// Duration of this interval in nanoseconds.
    pub fn duration_nanos(&self) -> i64 {
        match self {
            CandleInterval::M1 => 60 * NANOS_PER_SECOND,
            CandleInterval::M5 => 5 * 60 * NANOS_PER_SECOND,
            CandleInterval::M15 => 15 * 60 * NANOS_PER_SECOND,
            CandleInterval::H1 => 3600 * NANOS_PER_SECOND,
            CandleInterval::H4 => 4 * 3600 * NANOS_PER_SECOND,
            CandleInterval::D1 => 86400 * NANOS_PER_SECOND,
        }
    }

    /// Truncate a timestamp to this interval's boundary (floor, UTC).
    /// Daily candles land on 00:00 UTC because the epoch does.
    pub fn align(&self, timestamp_nanos: i64) -> i64 {
        let duration = self.duration_nanos();
        (timestamp_nanos / duration) * duration
    }

    /// Parse the wire form ("1m", "5m", "15m", "1h", "4h", "1d").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(CandleInterval::M1),
            "5m" => Some(CandleInterval::M5),
            "15m" => Some(CandleInterval::M15),
            "1h" => Some(CandleInterval::H1),
            "4h" => Some(CandleInterval::H4),
            "1d" => Some(CandleInterval::D1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::M1 => "1m",
            CandleInterval::M5 => "5m",
            CandleInterval::M15 => "15m",
            CandleInterval::H1 => "1h",
            CandleInterval::H4 => "4h",
            CandleInterval::D1 => "1d",
        }
    }
}

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: String,
    pub interval: CandleInterval,
    pub open_time: i64,  // Unix nanos, truncation boundary
    pub close_time: i64, // open_time + interval
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Base volume: Σ trade size
    pub volume: Decimal,
    pub trade_count: u64,
}

impl Candle {
    /// OHLC invariants hold: high dominates, low is dominated.
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= Decimal::ZERO
            && self.close_time > self.open_time
    }
}

/// Per-bucket accumulator tracking which trade was earliest/latest.
struct Bucket {
    earliest_ts: i64,
    latest_ts: i64,
    open: Price,
    close: Price,
    high: Price,
    low: Price,
    volume: Decimal,
    trade_count: u64,
}

impl Bucket {
    fn seed(trade: &Trade) -> Self {
        Self {
            earliest_ts: trade.timestamp,
            latest_ts: trade.timestamp,
            open: trade.price,
            close: trade.price,
            high: trade.price,
            low: trade.price,
            volume: trade.size.as_decimal(),
            trade_count: 1,
        }
    }

    fn absorb(&mut self, trade: &Trade) {
        if trade.timestamp < self.earliest_ts {
            self.earliest_ts = trade.timestamp;
            self.open = trade.price;
        }
        if trade.timestamp >= self.latest_ts {
            self.latest_ts = trade.timestamp;
            self.close = trade.price;
        }
        if trade.price > self.high {
            self.high = trade.price;
        }
        if trade.price < self.low {
            self.low = trade.price;
        }
        self.volume += trade.size.as_decimal();
        self.trade_count += 1;
    }
}

fn bucket_trades<'a>(
    trades: impl Iterator<Item = &'a Trade>,
    interval: CandleInterval,
) -> BTreeMap<i64, Bucket> {
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for trade in trades {
        let open_time = interval.align(trade.timestamp);
        buckets
            .entry(open_time)
            .and_modify(|b| b.absorb(trade))
            .or_insert_with(|| Bucket::seed(trade));
    }
    buckets
}

fn into_candle(instrument: &str, interval: CandleInterval, open_time: i64, b: Bucket) -> Candle {
    Candle {
        instrument: instrument.to_string(),
        interval,
        open_time,
        close_time: open_time + interval.duration_nanos(),
        open: b.open,
        high: b.high,
        low: b.low,
        close: b.close,
        volume: b.volume,
        trade_count: b.trade_count,
    }
}

/// Build candles from a trade history, newest candle first.
pub fn build_candles(
    trades: &[Trade],
    instrument: &str,
    interval: CandleInterval,
    limit: usize,
) -> Vec<Candle> {
    let buckets = bucket_trades(
        trades.iter().filter(|t| t.instrument == instrument),
        interval,
    );
    buckets
        .into_iter()
        .rev()
        .take(limit)
        .map(|(open_time, b)| into_candle(instrument, interval, open_time, b))
        .collect()
}

/// Build candles for trades within [start, end], oldest candle first.
pub fn build_candles_between(
    trades: &[Trade],
    instrument: &str,
    interval: CandleInterval,
    start: i64,
    end: i64,
    limit: usize,
) -> Vec<Candle> {
    let buckets = bucket_trades(
        trades
            .iter()
            .filter(|t| t.instrument == instrument && t.timestamp >= start && t.timestamp <= end),
        interval,
    );
    buckets
        .into_iter()
        .take(limit)
        .map(|(open_time, b)| into_candle(instrument, interval, open_time, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{OrderId, TradeId, TraderId};
    use types::numeric::Quantity;
    use types::order::Side;
    use types::position::PositionEffect;
    use types::R_INDEX;

    const MINUTE: i64 = 60 * NANOS_PER_SECOND;

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

    #[test]
    fn test_interval_align() {
        let ts = 3 * MINUTE + 17 * NANOS_PER_SECOND;
        assert_eq!(CandleInterval::M1.align(ts), 3 * MINUTE);
        assert_eq!(CandleInterval::M5.align(ts), 0);
    }

    #[test]
    fn test_interval_parse_round_trip() {
        for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            assert_eq!(CandleInterval::parse(s).unwrap().as_str(), s);
        }
        assert!(CandleInterval::parse("2m").is_none());
    }

    #[test]
    fn test_interval_serde() {
        assert_eq!(serde_json::to_string(&CandleInterval::H4).unwrap(), "\"4h\"");
        let parsed: CandleInterval = serde_json::from_str("\"1d\"").unwrap();
        assert_eq!(parsed, CandleInterval::D1);
    }

    #[test]
    fn test_single_bucket_ohlcv() {
        // History arrives newest-first, like the kernel's trade ring
        let trades = vec![
            trade(105, 1, 30 * NANOS_PER_SECOND),
            trade(90, 2, 20 * NANOS_PER_SECOND),
            trade(110, 1, 10 * NANOS_PER_SECOND),
            trade(100, 1, 1 * NANOS_PER_SECOND),
        ];

        let candles = build_candles(&trades, R_INDEX, CandleInterval::M1, 10);
        assert_eq!(candles.len(), 1);
        let c = &candles[0];

        // Open is the earliest trade regardless of input order
        assert_eq!(c.open, Price::from_u64(100));
        assert_eq!(c.close, Price::from_u64(105));
        assert_eq!(c.high, Price::from_u64(110));
        assert_eq!(c.low, Price::from_u64(90));
        assert_eq!(c.volume, Decimal::from(5));
        assert_eq!(c.trade_count, 4);
        assert!(c.is_valid());
    }

    #[test]
    fn test_multiple_buckets_newest_first() {
        let trades = vec![
            trade(103, 1, 2 * MINUTE + 1),
            trade(102, 1, MINUTE + 1),
            trade(101, 1, 1),
        ];

        let candles = build_candles(&trades, R_INDEX, CandleInterval::M1, 10);
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open_time, 2 * MINUTE);
        assert_eq!(candles[2].open_time, 0);
        assert_eq!(candles[0].close, Price::from_u64(103));
    }

    #[test]
    fn test_limit_keeps_newest() {
        let trades = vec![
            trade(103, 1, 2 * MINUTE + 1),
            trade(102, 1, MINUTE + 1),
            trade(101, 1, 1),
        ];
        let candles = build_candles(&trades, R_INDEX, CandleInterval::M1, 2);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 2 * MINUTE);
        assert_eq!(candles[1].open_time, MINUTE);
    }

    #[test]
    fn test_historical_range_oldest_first() {
        let trades = vec![
            trade(103, 1, 2 * MINUTE + 1),
            trade(102, 1, MINUTE + 1),
            trade(101, 1, 1),
        ];
        let candles = build_candles_between(
            &trades,
            R_INDEX,
            CandleInterval::M1,
            0,
            MINUTE + 30 * NANOS_PER_SECOND,
            10,
        );
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 0);
        assert_eq!(candles[1].open_time, MINUTE);
    }

    #[test]
    fn test_other_instrument_excluded() {
        let mut foreign = trade(100, 1, 1);
        foreign.instrument = "X.index".to_string();
        let candles = build_candles(&[foreign], R_INDEX, CandleInterval::M1, 10);
        assert!(candles.is_empty());
    }
}
