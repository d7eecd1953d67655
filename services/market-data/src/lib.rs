//! Market data derivations
//!
//! Pure functions over the kernel's trade history and position set:
//! OHLCV candles bucketed by interval, market statistics, and the
//! open-interest breakdown. The matching engine calls these under its read
//! lock; nothing here holds state.

pub mod candles;
pub mod stats;

pub use candles::{build_candles, build_candles_between, Candle, CandleInterval};
pub use stats::{market_stats, open_interest};
