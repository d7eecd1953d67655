//! Risk engine for the trading kernel
//!
//! Margin and liquidation-price arithmetic, the insurance fund, and the
//! liquidation monitor that periodically force-closes underwater positions
//! at mark price.

pub mod insurance;
pub mod liquidation;
pub mod margin;
pub mod monitor;

pub use insurance::InsuranceFund;
pub use monitor::{LiquidationMonitor, MonitorHandle, PositionStore, PriceProvider};
