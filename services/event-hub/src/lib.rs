//! Event fan-out hub
//!
//! Broadcasts trades, order updates, position updates and liquidations to
//! any number of concurrent subscribers, plus per-channel order-book
//! snapshots. Each subscriber owns a bounded outbound buffer; a subscriber
//! that falls behind is dropped, never allowed to stall the dispatcher.
//!
//! Transport (WebSocket framing, ping/pong liveness, read timeouts) is the
//! gateway's concern — the hub only implements fan-out semantics.

pub mod dispatcher;
pub mod hub;

pub use dispatcher::{orderbook_channel, run_dispatcher};
pub use hub::{EventHub, Message, MessageType, SubscriberHandle};
