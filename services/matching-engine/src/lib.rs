//! Matching engine for the R.index perpetual-futures kernel
//!
//! The single synchronous authority over the order book and position
//! ledger: it accepts orders, executes price-time-priority matches,
//! mutates positions, persists every touched record, and emits events for
//! the fan-out hub.
//!
//! # Modules
//! - `book`: price-indexed FIFO order book
//! - `ledger`: position arithmetic (weighted entry, realize, flip)
//! - `engine`: the engine itself
//! - `events`: engine event stream consumed by the hub dispatcher

pub mod book;
pub mod engine;
pub mod events;
pub mod ledger;

pub use engine::{MatchingEngine, OrderRequest};
pub use events::{EngineEvent, EventSender};
