//! Shared types for the R.index trading kernel
//!
//! This library provides the domain vocabulary used across the kernel:
//! identifiers, exact-decimal numerics, order/trade/position records, the
//! error taxonomy, and the configuration document.
//!
//! Everything here is transport-agnostic: the HTTP/WebSocket layer and the
//! authentication service consume these types but are not part of the kernel.
//!
//! # Modules
//! - `ids`: unique identifiers (OrderId, TradeId, TraderId, LiquidationId)
//! - `numeric`: exact decimal types (Price, Quantity)
//! - `order`: order lifecycle types
//! - `trade`: immutable trade records
//! - `trader`: market participants
//! - `position`: per-trader positions and leverage tiers
//! - `liquidation`: forced-close records and the insurance fund
//! - `market`: order-book snapshots, market stats, open interest
//! - `errors`: kernel error taxonomy
//! - `config`: YAML configuration with environment expansion
//! - `clock`: unix-nanosecond timestamps

pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
pub mod trader;
pub mod position;
pub mod liquidation;
pub mod market;
pub mod errors;
pub mod config;
pub mod clock;

/// The single tradeable instrument.
pub const R_INDEX: &str = "R.index";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
    pub use crate::trader::*;
    pub use crate::position::*;
    pub use crate::liquidation::*;
    pub use crate::market::*;
    pub use crate::errors::*;
    pub use crate::config::*;
    pub use crate::R_INDEX;
}
