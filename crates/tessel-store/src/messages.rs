use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessel_shared::types::MessageKind;

use crate::arena::{ContactId, TransferId};

/// Message id assigned by the transport, scoped by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolMessageId {
    Friend(u32),
    Group(u32),
}

impl ProtocolMessageId {
    pub fn value(self) -> u32 {
        match self {
            Self::Friend(id) | Self::Group(id) => id,
        }
    }
}

/// A text message or a file share, addressed between two contacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: ContactId,
    pub to: ContactId,
    pub text: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub written_at: Option<DateTime<Utc>>,
    pub unread: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub protocol_id: Option<ProtocolMessageId>,
    /// Contacts that have this message in their history.
    pub synced_by: BTreeMap<ContactId, DateTime<Utc>>,
    /// Contacts that confirmed receipt. First timestamp wins.
    pub received_by: BTreeMap<ContactId, DateTime<Utc>>,
    pub transfer: Option<TransferId>,
}

impl Message {
    pub fn new(from: ContactId, to: ContactId, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
            kind: MessageKind::Normal,
            timestamp: Utc::now(),
            processed_at: None,
            written_at: None,
            unread: false,
            read_at: None,
            protocol_id: None,
            synced_by: BTreeMap::new(),
            received_by: BTreeMap::new(),
            transfer: None,
        }
    }

    /// Record a receipt unless one is already there.
    pub fn mark_received(&mut self, by: ContactId, at: DateTime<Utc>) -> bool {
        use std::collections::btree_map::Entry;
        match self.received_by.entry(by) {
            Entry::Vacant(e) => {
                e.insert(at);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn mark_synced(&mut self, by: ContactId, at: DateTime<Utc>) {
        self.synced_by.insert(by, at);
    }
}
