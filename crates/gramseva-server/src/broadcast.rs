//! Fan-out of collection updates to realtime subscribers.
//!
//! Every successful write publishes the full collection. Each WebSocket
//! session holds one receiver; a receiver that falls more than `capacity`
//! updates behind gets `Lagged` and resynchronizes from disk.

use std::sync::Arc;

use gramseva_types::{ChannelMessage, Collection};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// One published collection state.
#[derive(Clone, Debug)]
pub struct CollectionUpdate {
    pub collection: Collection,
    pub payload: Arc<Value>,
}

impl CollectionUpdate {
    pub fn to_message(&self) -> ChannelMessage {
        ChannelMessage::update(self.collection, (*self.payload).clone())
    }
}

#[derive(Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<CollectionUpdate>,
    capacity: usize,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish a collection's new state. Returns the number of receivers.
    pub fn publish(&self, collection: Collection, payload: Value) -> usize {
        let update = CollectionUpdate {
            collection,
            payload: Arc::new(payload),
        };
        let receivers = self.tx.send(update).unwrap_or(0);
        debug!(collection = %collection, receivers, "broadcast");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionUpdate> {
        self.tx.subscribe()
    }
}
