//! Engine event stream
//!
//! The engine pushes events into an unbounded channel instead of invoking
//! handlers: fan-out runs outside the engine lock, so a slow subscriber can
//! never inflate matching latency. Within one fill, the trade event is
//! emitted before any order or position event derived from it.

use tokio::sync::mpsc;
use types::ids::TraderId;
use types::liquidation::Liquidation;
use types::market::BookSnapshot;
use types::order::Order;
use types::position::Position;
use types::trade::Trade;

/// Everything the engine announces to the outside world.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Trade(Trade),
    Order(Order),
    Position(Position),
    /// A position went flat (voluntary close or forced)
    PositionClosed {
        trader_id: TraderId,
        instrument: String,
    },
    Liquidation(Liquidation),
    Book(BookSnapshot),
}

/// Non-blocking sender half handed to the engine.
#[derive(Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EventSender {
    /// A connected sender/receiver pair. The receiver goes to the hub
    /// dispatcher.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sender that drops everything. For tests and tools that do not
    /// care about events.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event. Errors (receiver gone) are ignored: event fan-out
    /// must never propagate failure back into the engine.
    pub fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
