//! Text messages and read receipts.
//!
//! Messages are addressed between contacts. An incoming message goes to the
//! sender's self link (for group messages, to the group itself); an outgoing
//! one goes from the target's self link to the target.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use tessel_net::Transport;
use tessel_shared::types::MessageKind;
use tessel_store::{
    ContactId, ContactKey, EntityStore, EphemeralHandle, Message, MessageId, ProtocolMessageId,
};

use crate::error::{CoreError, Result};

/// Text is cut at the first NUL, the transport pads with them.
fn clean_text(text: &str) -> &str {
    text.split('\0').next().unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct MessageManager {
    /// (group, sender, protocol id) of every group message seen.
    group_seen: HashMap<(ContactId, ContactId, u32), MessageId>,
}

impl MessageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the group dedupe table from stored messages.
    pub fn rebuild(store: &EntityStore) -> Self {
        let group_seen = store
            .messages()
            .filter_map(|(id, m)| match m.protocol_id {
                Some(ProtocolMessageId::Group(pid)) => Some(((m.to, m.from, pid), id)),
                _ => None,
            })
            .collect();
        Self { group_seen }
    }

    /// Append an outgoing message and hand it to the transport. A failed or
    /// impossible send still records the message, under a random id, so it
    /// can be synced later.
    pub fn send_text(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        contact: ContactId,
        text: &str,
        kind: MessageKind,
    ) -> Result<MessageId> {
        if text.is_empty() {
            return Err(CoreError::InvalidTarget {
                contact,
                reason: "empty message",
            });
        }

        let c = store.contact(contact)?;
        if c.tags.self_strong {
            return Err(CoreError::InvalidTarget {
                contact,
                reason: "contact is ourselves",
            });
        }
        let is_group = match c.key() {
            Some(key) => matches!(key, ContactKey::Group(_) | ContactKey::GroupPeer { .. }),
            None => {
                return Err(CoreError::InvalidTarget {
                    contact,
                    reason: "contact has no key",
                })
            }
        };
        let from = c.self_link.ok_or(CoreError::MissingSelf(contact))?;
        let handle = c.ephemeral;

        let sent = match handle {
            Some(EphemeralHandle::Friend(friend)) => net
                .friend_send_message(friend, kind, text)
                .map(ProtocolMessageId::Friend),
            Some(EphemeralHandle::Group(group)) => net
                .group_send_message(group, kind, text)
                .map(ProtocolMessageId::Group),
            Some(EphemeralHandle::GroupPeer { group, peer }) => net
                .group_send_private_message(group, peer, kind, text)
                .map(ProtocolMessageId::Group),
            None => Err(tessel_net::TransportError::Rejected("contact offline".into())),
        };

        let protocol_id = match sent {
            Ok(id) => id,
            Err(e) => {
                warn!(contact = %contact, error = %e, "Message not sent, kept for later sync");
                let id = rand::random::<u32>();
                if is_group {
                    ProtocolMessageId::Group(id)
                } else {
                    ProtocolMessageId::Friend(id)
                }
            }
        };

        let now = Utc::now();
        let mut m = Message::new(from, contact, text);
        m.kind = kind;
        m.timestamp = now;
        m.processed_at = Some(now);
        m.written_at = Some(now);
        m.read_at = Some(now);
        m.protocol_id = Some(protocol_id);
        if is_group {
            m.mark_synced(from, now);
        }
        let id = store.create_message(m);
        if let ProtocolMessageId::Group(pid) = protocol_id {
            if matches!(handle, Some(EphemeralHandle::Group(_))) {
                self.group_seen.insert((contact, from, pid), id);
            }
        }

        debug!(message = %id, contact = %contact, protocol_id = protocol_id.value(), "Message appended");
        store.notify_construct(id);
        Ok(id)
    }

    pub fn on_friend_message(
        &mut self,
        store: &mut EntityStore,
        contact: ContactId,
        kind: MessageKind,
        text: &str,
    ) -> Result<MessageId> {
        let to = store
            .contact(contact)?
            .self_link
            .ok_or(CoreError::MissingSelf(contact))?;
        let id = self.append_incoming(store, contact, to, kind, text, None);
        Ok(id)
    }

    /// Returns `None` for a message already seen, whose sync record is
    /// refreshed instead.
    pub fn on_group_message(
        &mut self,
        store: &mut EntityStore,
        group: ContactId,
        sender: ContactId,
        message_id: u32,
        kind: MessageKind,
        text: &str,
    ) -> Result<Option<MessageId>> {
        let me = store
            .contact(group)?
            .self_link
            .ok_or(CoreError::MissingSelf(group))?;
        let now = Utc::now();

        if let Some(&existing) = self.group_seen.get(&(group, sender, message_id)) {
            if let Ok(m) = store.message_mut(existing) {
                m.mark_synced(me, now);
                store.notify_update(existing);
                debug!(message = %existing, group = %group, message_id, "Duplicate group message");
                return Ok(None);
            }
        }

        let id = self.append_incoming(
            store,
            sender,
            group,
            kind,
            text,
            Some(ProtocolMessageId::Group(message_id)),
        );
        if let Ok(m) = store.message_mut(id) {
            m.mark_synced(me, now);
            m.mark_received(me, now);
        }
        self.group_seen.insert((group, sender, message_id), id);
        Ok(Some(id))
    }

    pub fn on_group_private_message(
        &mut self,
        store: &mut EntityStore,
        sender: ContactId,
        kind: MessageKind,
        text: &str,
    ) -> Result<MessageId> {
        let to = store
            .contact(sender)?
            .self_link
            .ok_or(CoreError::MissingSelf(sender))?;
        Ok(self.append_incoming(store, sender, to, kind, text, None))
    }

    /// Record the first receipt for the outgoing message with this id.
    pub fn on_read_receipt(
        &mut self,
        store: &mut EntityStore,
        contact: ContactId,
        message_id: u32,
    ) -> Result<Option<MessageId>> {
        let me = store
            .contact(contact)?
            .self_link
            .ok_or(CoreError::MissingSelf(contact))?;
        let target = Some(ProtocolMessageId::Friend(message_id));
        let Some(id) =
            store.find_message(|m| m.from == me && m.to == contact && m.protocol_id == target)
        else {
            debug!(contact = %contact, message_id, "Receipt for unknown message");
            return Ok(None);
        };

        if store.message_mut(id)?.mark_received(contact, Utc::now()) {
            store.notify_update(id);
        }
        Ok(Some(id))
    }

    fn append_incoming(
        &mut self,
        store: &mut EntityStore,
        from: ContactId,
        to: ContactId,
        kind: MessageKind,
        text: &str,
        protocol_id: Option<ProtocolMessageId>,
    ) -> MessageId {
        let now = Utc::now();
        let mut m = Message::new(from, to, clean_text(text));
        m.kind = kind;
        m.timestamp = now;
        m.processed_at = Some(now);
        m.unread = true;
        m.protocol_id = protocol_id;
        let id = store.create_message(m);

        if let Ok(c) = store.contact_mut(from) {
            c.last_activity = Some(now);
        }
        info!(message = %id, from = %from, to = %to, "Message received");
        store.notify_construct(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_net::{MemoryTransport, SentCommand};
    use tessel_shared::types::{FriendNumber, PublicKey};
    use tessel_store::Contact;

    struct Fixture {
        store: EntityStore,
        net: MemoryTransport,
        me: ContactId,
        bob: ContactId,
        friend: FriendNumber,
    }

    fn fixture() -> Fixture {
        let mut net = MemoryTransport::new(PublicKey([1; 32]), "me");
        let friend = net.add_friend(PublicKey([2; 32]), "bob");
        let mut store = EntityStore::new();

        let mut me = Contact::new();
        me.tags.self_strong = true;
        let me = store.create_contact(me);

        let mut bob = Contact::new();
        bob.attach_key(ContactKey::Friend(PublicKey([2; 32]))).unwrap();
        bob.ephemeral = Some(EphemeralHandle::Friend(friend));
        bob.self_link = Some(me);
        let bob = store.create_contact(bob);

        Fixture {
            store,
            net,
            me,
            bob,
            friend,
        }
    }

    fn group(f: &mut Fixture) -> (ContactId, ContactId) {
        let mut g = Contact::new();
        g.attach_key(ContactKey::Group(PublicKey([9; 32]))).unwrap();
        g.self_link = Some(f.me);
        let g = f.store.create_contact(g);
        let mut carol = Contact::new();
        carol.parent = Some(g);
        carol.self_link = Some(f.me);
        (g, f.store.create_contact(carol))
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("hi\0\0junk"), "hi");
        assert_eq!(clean_text("plain"), "plain");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_send_to_friend_records_protocol_id() {
        let mut f = fixture();
        let mut mgr = MessageManager::new();
        let id = mgr
            .send_text(&mut f.store, &mut f.net, f.bob, "hello", MessageKind::Normal)
            .unwrap();

        let m = f.store.message(id).unwrap();
        assert_eq!((m.from, m.to), (f.me, f.bob));
        assert_eq!(m.protocol_id, Some(ProtocolMessageId::Friend(1)));
        assert!(!m.unread);
        assert!(m.synced_by.is_empty());
        assert_eq!(
            f.net.sent(),
            &[SentCommand::FriendMessage {
                friend: f.friend,
                text: "hello".into(),
            }]
        );
    }

    #[test]
    fn test_send_offline_still_recorded() {
        let mut f = fixture();
        f.store.contact_mut(f.bob).unwrap().ephemeral = None;
        let mut mgr = MessageManager::new();
        let id = mgr
            .send_text(&mut f.store, &mut f.net, f.bob, "later", MessageKind::Action)
            .unwrap();

        let m = f.store.message(id).unwrap();
        assert!(matches!(m.protocol_id, Some(ProtocolMessageId::Friend(_))));
        assert_eq!(m.kind, MessageKind::Action);
        assert!(f.net.sent().is_empty());
    }

    #[test]
    fn test_send_rejects_bad_targets() {
        let mut f = fixture();
        let mut mgr = MessageManager::new();
        let me = f.me;
        assert!(matches!(
            mgr.send_text(&mut f.store, &mut f.net, me, "x", MessageKind::Normal),
            Err(CoreError::InvalidTarget { .. })
        ));
        let bob = f.bob;
        assert!(matches!(
            mgr.send_text(&mut f.store, &mut f.net, bob, "", MessageKind::Normal),
            Err(CoreError::InvalidTarget { .. })
        ));
        f.store.contact_mut(bob).unwrap().self_link = None;
        assert!(matches!(
            mgr.send_text(&mut f.store, &mut f.net, bob, "x", MessageKind::Normal),
            Err(CoreError::MissingSelf(c)) if c == bob
        ));
    }

    #[test]
    fn test_incoming_friend_message_unread() {
        let mut f = fixture();
        let mut mgr = MessageManager::new();
        let id = mgr
            .on_friend_message(&mut f.store, f.bob, MessageKind::Normal, "yo\0")
            .unwrap();
        let m = f.store.message(id).unwrap();
        assert_eq!((m.from, m.to), (f.bob, f.me));
        assert_eq!(m.text, "yo");
        assert!(m.unread);
        assert!(f.store.contact(f.bob).unwrap().last_activity.is_some());
    }

    #[test]
    fn test_group_message_dedupe() {
        let mut f = fixture();
        let (g, carol) = group(&mut f);
        let mut mgr = MessageManager::new();

        let first = mgr
            .on_group_message(&mut f.store, g, carol, 4, MessageKind::Normal, "hey")
            .unwrap()
            .unwrap();
        let again = mgr
            .on_group_message(&mut f.store, g, carol, 4, MessageKind::Normal, "hey")
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(f.store.messages().count(), 1);

        let m = f.store.message(first).unwrap();
        assert_eq!(m.to, g);
        assert!(m.synced_by.contains_key(&f.me));
        assert!(m.received_by.contains_key(&f.me));

        // same id from another sender is a different message
        let (_, dave) = group(&mut f);
        assert!(mgr
            .on_group_message(&mut f.store, g, dave, 4, MessageKind::Normal, "hey")
            .unwrap()
            .is_some());

        let rebuilt = MessageManager::rebuild(&f.store);
        assert_eq!(rebuilt.group_seen.len(), 2);
    }

    #[test]
    fn test_read_receipt_first_wins() {
        let mut f = fixture();
        let mut mgr = MessageManager::new();
        let id = mgr
            .send_text(&mut f.store, &mut f.net, f.bob, "hello", MessageKind::Normal)
            .unwrap();

        assert_eq!(mgr.on_read_receipt(&mut f.store, f.bob, 1).unwrap(), Some(id));
        let first = f.store.message(id).unwrap().received_by[&f.bob];
        mgr.on_read_receipt(&mut f.store, f.bob, 1).unwrap();
        assert_eq!(f.store.message(id).unwrap().received_by[&f.bob], first);

        assert_eq!(mgr.on_read_receipt(&mut f.store, f.bob, 99).unwrap(), None);
    }
}
