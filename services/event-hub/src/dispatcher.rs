//! Engine-to-hub bridge
//!
//! A single task drains the engine's event channel and fans the events out
//! through the hub. Trades, order updates, position updates and
//! liquidations broadcast to every subscriber; order-book snapshots go to
//! the `orderbook:<instrument>` channel only. Running outside the engine
//! lock, a slow subscriber can never inflate matching latency.

use matching_engine::EngineEvent;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::hub::{EventHub, Message, MessageType};

/// Channel name for an instrument's book snapshots.
pub fn orderbook_channel(instrument: &str) -> String {
    format!("orderbook:{}", instrument)
}

/// Drain engine events until the engine drops its sender.
pub async fn run_dispatcher(hub: Arc<EventHub>, mut events: UnboundedReceiver<EngineEvent>) {
    info!("event dispatcher started");
    while let Some(event) = events.recv().await {
        dispatch(&hub, event);
    }
    info!("event dispatcher stopped");
}

fn dispatch(hub: &EventHub, event: EngineEvent) {
    match event {
        EngineEvent::Trade(trade) => match serde_json::to_value(&trade) {
            Ok(data) => hub.broadcast(Message::new(MessageType::Trade, data)),
            Err(e) => warn!(error = %e, "failed to serialize trade event"),
        },
        EngineEvent::Order(order) => match serde_json::to_value(&order) {
            Ok(data) => hub.broadcast(Message::new(MessageType::Order, data)),
            Err(e) => warn!(error = %e, "failed to serialize order event"),
        },
        EngineEvent::Position(position) => match serde_json::to_value(&position) {
            Ok(data) => hub.broadcast(Message::new(MessageType::Position, data)),
            Err(e) => warn!(error = %e, "failed to serialize position event"),
        },
        EngineEvent::PositionClosed {
            trader_id,
            instrument,
        } => {
            // A flat position has no record; announce the close itself
            let data = json!({
                "trader_id": trader_id,
                "instrument": instrument,
                "size": "0",
            });
            hub.broadcast(Message::new(MessageType::Position, data));
        }
        EngineEvent::Liquidation(liquidation) => match serde_json::to_value(&liquidation) {
            Ok(data) => hub.broadcast(Message::new(MessageType::Liquidation, data)),
            Err(e) => warn!(error = %e, "failed to serialize liquidation event"),
        },
        EngineEvent::Book(snapshot) => {
            let channel = orderbook_channel(&snapshot.instrument);
            match serde_json::to_value(&snapshot) {
                Ok(data) => hub.broadcast_channel(
                    &channel,
                    Message::with_channel(MessageType::Orderbook, channel.clone(), data),
                ),
                Err(e) => warn!(error = %e, "failed to serialize book snapshot"),
            }
        }
    }
}
