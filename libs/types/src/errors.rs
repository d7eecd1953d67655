//! Kernel error taxonomy
//!
//! Validation errors surface to the caller without any state mutation or
//! event emission. The outer API layer maps these to transport status codes;
//! the kernel only distinguishes the kinds.

use crate::ids::{OrderId, TraderId};
use thiserror::Error;

/// Top-level kernel error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("unknown trader: {0}")]
    UnknownTrader(TraderId),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] InvalidOrderReason),

    #[error("market order cancelled: only own liquidity available")]
    SelfTradeOnly,

    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("no position to close for trader {0}")]
    NoPosition(TraderId),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Order validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidOrderReason {
    #[error("size must be positive")]
    NonPositiveSize,

    #[error("size {size} below minimum {min}")]
    BelowMinimumSize { size: String, min: String },

    #[error("leverage {leverage} out of range [1, {max}]")]
    LeverageOutOfRange { leverage: u32, max: u32 },

    #[error("limit order requires a positive price")]
    NonPositivePrice,
}
