//! Subscriber registry and broadcast
//!
//! Subscribers register to receive every broadcast event; channel-scoped
//! events (order-book snapshots) only reach subscribers of that channel.
//! Buffers are bounded: when a subscriber's queue is full the hub drops
//! the subscriber and closes its stream.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::clock;

/// Per-subscriber outbound buffer capacity.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// Kinds of messages on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Trade,
    Order,
    Position,
    Liquidation,
    Orderbook,
    Subscribe,
    Unsubscribe,
}

/// The event envelope. `data` is a serialized domain record; `timestamp`
/// is milliseconds since epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

impl Message {
    pub fn new(message_type: MessageType, data: serde_json::Value) -> Self {
        Self {
            message_type,
            channel: None,
            data,
            timestamp: clock::nanos_to_millis(clock::now_nanos()),
        }
    }

    pub fn with_channel(message_type: MessageType, channel: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message_type,
            channel: Some(channel.into()),
            data,
            timestamp: clock::nanos_to_millis(clock::now_nanos()),
        }
    }
}

pub type SubscriberId = u64;

struct Subscriber {
    sender: mpsc::Sender<Message>,
    channels: HashSet<String>,
}

/// What a subscriber holds: its id and the receiving end of its buffer.
pub struct SubscriberHandle {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Message>,
}

/// The fan-out hub.
pub struct EventHub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber; it receives every broadcast from now on.
    pub fn register(&self) -> SubscriberHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);

        let mut subscribers = self.lock_write();
        subscribers.insert(
            id,
            Subscriber {
                sender,
                channels: HashSet::new(),
            },
        );
        info!(subscriber = id, total = subscribers.len(), "subscriber connected");
        SubscriberHandle { id, receiver }
    }

    /// Remove a subscriber; its stream closes when the sender drops.
    pub fn unregister(&self, id: SubscriberId) {
        let mut subscribers = self.lock_write();
        if subscribers.remove(&id).is_some() {
            info!(subscriber = id, total = subscribers.len(), "subscriber disconnected");
        }
    }

    /// Add a channel subscription.
    pub fn subscribe(&self, id: SubscriberId, channel: impl Into<String>) {
        let mut subscribers = self.lock_write();
        if let Some(subscriber) = subscribers.get_mut(&id) {
            subscriber.channels.insert(channel.into());
        }
    }

    /// Drop a channel subscription.
    pub fn unsubscribe(&self, id: SubscriberId, channel: &str) {
        let mut subscribers = self.lock_write();
        if let Some(subscriber) = subscribers.get_mut(&id) {
            subscriber.channels.remove(channel);
        }
    }

    /// Handle a subscriber's control message
    /// (`{"type":"subscribe","data":"orderbook:R.index"}`).
    pub fn handle_control(&self, id: SubscriberId, message: &Message) {
        let Some(channel) = message.data.as_str() else {
            return;
        };
        match message.message_type {
            MessageType::Subscribe => self.subscribe(id, channel),
            MessageType::Unsubscribe => self.unsubscribe(id, channel),
            _ => {}
        }
    }

    /// Send to every subscriber. Subscribers with full buffers are dropped.
    pub fn broadcast(&self, message: Message) {
        self.deliver(message, None);
    }

    /// Send to subscribers of one channel only.
    pub fn broadcast_channel(&self, channel: &str, message: Message) {
        self.deliver(message, Some(channel));
    }

    fn deliver(&self, message: Message, channel: Option<&str>) {
        let mut lagging = Vec::new();
        {
            let subscribers = self.lock_read();
            for (id, subscriber) in subscribers.iter() {
                if let Some(channel) = channel {
                    if !subscriber.channels.contains(channel) {
                        continue;
                    }
                }
                match subscriber.sender.try_send(message.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => lagging.push(*id),
                    Err(mpsc::error::TrySendError::Closed(_)) => lagging.push(*id),
                }
            }
        }

        // Buffer overflow means the subscriber cannot keep up: drop it
        // rather than block the dispatcher.
        if !lagging.is_empty() {
            let mut subscribers = self.lock_write();
            for id in lagging {
                if subscribers.remove(&id).is_some() {
                    warn!(subscriber = id, "dropping lagging subscriber");
                }
            }
        } else {
            debug!(kind = ?message.message_type, "event delivered");
        }
    }

    /// Connected subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.lock_read().len()
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.read().expect("hub lock poisoned")
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.write().expect("hub lock poisoned")
    }
}
