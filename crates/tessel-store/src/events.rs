//! Construct/update/destroy notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::arena::{ContactId, MessageId, TransferId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    Contact(ContactId),
    Message(MessageId),
    Transfer(TransferId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    Construct(EntityRef),
    Update(EntityRef),
    Destroy(EntityRef),
}

/// Fan-out of store events to any number of observers. Dropped receivers
/// are pruned on the next emit.
#[derive(Debug, Default)]
pub struct ObserverBus {
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: StoreEvent) {
        trace!(?event, "store event");
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
