//! Contact entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessel_shared::types::{ConnectionMode, FriendNumber, GroupNumber, PeerNumber, PublicKey};

use crate::arena::ContactId;
use crate::error::{Result, StoreError};

/// The persistent identity of a contact, per identity class.
///
/// A group member's key is only unique within its group, so the chat id is
/// part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKey {
    Account(PublicKey),
    Friend(PublicKey),
    Group(PublicKey),
    GroupPeer {
        chat_id: PublicKey,
        peer_key: PublicKey,
    },
}

impl ContactKey {
    /// The raw key bytes a placeholder would carry for this identity.
    pub fn raw(&self) -> &PublicKey {
        match self {
            Self::Account(k) | Self::Friend(k) | Self::Group(k) => k,
            Self::GroupPeer { peer_key, .. } => peer_key,
        }
    }
}

/// Transport session handle, per identity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EphemeralHandle {
    Friend(FriendNumber),
    Group(GroupNumber),
    GroupPeer {
        group: GroupNumber,
        peer: PeerNumber,
    },
}

/// Role markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactTags {
    /// Account root / profile anchor.
    pub root: bool,
    /// Represents the local account in its context.
    pub self_strong: bool,
    pub group: bool,
    pub group_member: bool,
    /// Top-level addressable.
    pub big: bool,
    /// Sub-entity that is not listed on its own.
    pub private: bool,
}

/// A request from the remote side that has not been accepted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomingRequest {
    Friend {
        message: String,
    },
    Group {
        friend: FriendNumber,
        invite_data: Vec<u8>,
    },
}

/// One addressable identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    key: Option<ContactKey>,
    /// Present only while the transport holds a session for this identity.
    pub ephemeral: Option<EphemeralHandle>,
    /// Raw identity bytes. A contact with these but no `key` is a placeholder.
    pub raw_id: Option<PublicKey>,
    /// Chat id a placeholder's raw key is scoped to. `None` is global.
    pub raw_scope: Option<PublicKey>,
    pub name: Option<String>,
    pub status_text: Option<String>,
    pub connection: ConnectionMode,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub parent: Option<ContactId>,
    pub children: Vec<ContactId>,
    /// The contact standing for "me" in this contact's context.
    pub self_link: Option<ContactId>,
    pub tags: ContactTags,
    pub request: Option<IncomingRequest>,
}

impl Contact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&ContactKey> {
        self.key.as_ref()
    }

    /// Attach the persistent key. Re-attaching the same key is a no-op; a
    /// different key is refused.
    pub fn attach_key(&mut self, key: ContactKey) -> Result<()> {
        match self.key {
            Some(existing) if existing != key => Err(StoreError::KeyMismatch { existing }),
            Some(_) => Ok(()),
            None => {
                self.raw_id = Some(*key.raw());
                self.key = Some(key);
                Ok(())
            }
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.key.is_none() && self.raw_id.is_some()
    }

    /// Add a child at most once. Returns whether it was added.
    pub fn add_child(&mut self, child: ContactId) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}
