//! Identity Index.
//!
//! Three maps over the contact table: live session handle, persistent key,
//! and bare raw key of placeholders. All three are derived state and can be
//! rebuilt from the store with [`IdentityIndex::rebuild`].

use std::collections::HashMap;

use tracing::debug;

use tessel_shared::types::PublicKey;
use tessel_store::{ContactId, ContactKey, EntityStore, EphemeralHandle};

use crate::error::Result;

/// Uniqueness scope of a raw key. Group members are only unique within their
/// group, everything else is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    /// Keyed by the group's chat id.
    Group(PublicKey),
}

impl Scope {
    pub fn of(key: &ContactKey) -> Self {
        match key {
            ContactKey::GroupPeer { chat_id, .. } => Self::Group(*chat_id),
            _ => Self::Global,
        }
    }
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_handle: HashMap<EphemeralHandle, ContactId>,
    by_key: HashMap<ContactKey, ContactId>,
    placeholders: HashMap<(Scope, PublicKey), ContactId>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_handle(&self, handle: &EphemeralHandle) -> Option<ContactId> {
        self.by_handle.get(handle).copied()
    }

    pub fn by_key(&self, key: &ContactKey) -> Option<ContactId> {
        self.by_key.get(key).copied()
    }

    pub fn placeholder(&self, scope: Scope, raw: &PublicKey) -> Option<ContactId> {
        self.placeholders.get(&(scope, *raw)).copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = (&EphemeralHandle, &ContactId)> {
        self.by_handle.iter()
    }

    pub fn handle_count(&self) -> usize {
        self.by_handle.len()
    }

    pub fn register_placeholder(&mut self, scope: Scope, raw: PublicKey, id: ContactId) {
        self.placeholders.insert((scope, raw), id);
    }

    /// Attach the persistent key to a contact and index it. A placeholder
    /// entry for the same raw key is retired.
    pub fn attach_key(
        &mut self,
        store: &mut EntityStore,
        id: ContactId,
        key: ContactKey,
    ) -> Result<()> {
        store.contact_mut(id)?.attach_key(key)?;
        let scope = Scope::of(&key);
        if self.placeholders.get(&(scope, *key.raw())) == Some(&id) {
            self.placeholders.remove(&(scope, *key.raw()));
        }
        self.by_key.insert(key, id);
        Ok(())
    }

    /// Bind `handle` to `id`, keeping one handle per contact and one contact
    /// per handle. Returns a contact that previously held the handle, if any;
    /// it has lost its handle and needs an update notification.
    pub fn attach_handle(
        &mut self,
        store: &mut EntityStore,
        id: ContactId,
        handle: EphemeralHandle,
    ) -> Result<Option<ContactId>> {
        // make sure `id` is live before touching anything
        let previous = store.contact(id)?.ephemeral;

        let displaced = match self.by_handle.get(&handle).copied() {
            Some(other) if other != id => {
                debug!(contact = %other, ?handle, "handle moved to another contact");
                if let Ok(c) = store.contact_mut(other) {
                    if c.ephemeral == Some(handle) {
                        c.ephemeral = None;
                    }
                }
                Some(other)
            }
            _ => None,
        };

        if let Some(old) = previous {
            if old != handle && self.by_handle.get(&old) == Some(&id) {
                self.by_handle.remove(&old);
            }
        }

        store.contact_mut(id)?.ephemeral = Some(handle);
        self.by_handle.insert(handle, id);
        Ok(displaced)
    }

    /// Drop the contact's live handle. Returns the handle it had.
    pub fn detach_handle(
        &mut self,
        store: &mut EntityStore,
        id: ContactId,
    ) -> Result<Option<EphemeralHandle>> {
        let old = store.contact_mut(id)?.ephemeral.take();
        if let Some(handle) = old {
            if self.by_handle.get(&handle) == Some(&id) {
                self.by_handle.remove(&handle);
            }
        }
        Ok(old)
    }

    /// Recompute every map from the contact table.
    pub fn rebuild(store: &EntityStore) -> Self {
        let mut index = Self::new();
        for (id, contact) in store.contacts() {
            if let Some(handle) = contact.ephemeral {
                index.by_handle.insert(handle, id);
            }
            match (contact.key(), contact.raw_id) {
                (Some(key), _) => {
                    index.by_key.insert(*key, id);
                }
                (None, Some(raw)) => {
                    let scope = contact
                        .raw_scope
                        .map(Scope::Group)
                        .or_else(|| {
                            let parent = store.contact(contact.parent?).ok()?;
                            match parent.key() {
                                Some(ContactKey::Group(chat_id)) => Some(Scope::Group(*chat_id)),
                                _ => None,
                            }
                        })
                        .unwrap_or(Scope::Global);
                    index.placeholders.insert((scope, raw), id);
                }
                (None, None) => {}
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_shared::types::{FriendNumber, GroupNumber, PeerNumber};
    use tessel_store::Contact;

    fn key(b: u8) -> ContactKey {
        ContactKey::Friend(PublicKey([b; 32]))
    }

    #[test]
    fn test_handle_moves_between_contacts() {
        let mut store = EntityStore::new();
        let mut index = IdentityIndex::new();
        let a = store.create_contact(Contact::new());
        let b = store.create_contact(Contact::new());
        let h = EphemeralHandle::Friend(FriendNumber(1));

        assert_eq!(index.attach_handle(&mut store, a, h).unwrap(), None);
        assert_eq!(index.attach_handle(&mut store, b, h).unwrap(), Some(a));

        assert_eq!(index.by_handle(&h), Some(b));
        assert_eq!(store.contact(a).unwrap().ephemeral, None);
        assert_eq!(store.contact(b).unwrap().ephemeral, Some(h));
    }

    #[test]
    fn test_new_handle_replaces_old() {
        let mut store = EntityStore::new();
        let mut index = IdentityIndex::new();
        let a = store.create_contact(Contact::new());
        let h1 = EphemeralHandle::Friend(FriendNumber(1));
        let h2 = EphemeralHandle::Friend(FriendNumber(2));

        index.attach_handle(&mut store, a, h1).unwrap();
        index.attach_handle(&mut store, a, h2).unwrap();

        assert_eq!(index.by_handle(&h1), None);
        assert_eq!(index.by_handle(&h2), Some(a));
        assert_eq!(index.handle_count(), 1);

        assert_eq!(index.detach_handle(&mut store, a).unwrap(), Some(h2));
        assert_eq!(index.handle_count(), 0);
    }

    #[test]
    fn test_attach_key_retires_placeholder() {
        let mut store = EntityStore::new();
        let mut index = IdentityIndex::new();
        let mut c = Contact::new();
        c.raw_id = Some(PublicKey([5; 32]));
        let id = store.create_contact(c);
        index.register_placeholder(Scope::Global, PublicKey([5; 32]), id);

        index.attach_key(&mut store, id, key(5)).unwrap();
        assert_eq!(index.placeholder(Scope::Global, &PublicKey([5; 32])), None);
        assert_eq!(index.by_key(&key(5)), Some(id));

        // a different key is refused and the index is untouched
        assert!(index.attach_key(&mut store, id, key(6)).is_err());
        assert_eq!(index.by_key(&key(6)), None);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut store = EntityStore::new();
        let mut index = IdentityIndex::new();

        let chat = PublicKey([9; 32]);
        let group = store.create_contact(Contact::new());
        index.attach_key(&mut store, group, ContactKey::Group(chat)).unwrap();
        let gh = EphemeralHandle::Group(GroupNumber(0));
        index.attach_handle(&mut store, group, gh).unwrap();

        let mut member = Contact::new();
        member.raw_id = Some(PublicKey([3; 32]));
        member.parent = Some(group);
        let member = store.create_contact(member);
        index.register_placeholder(Scope::Group(chat), PublicKey([3; 32]), member);

        let peer = EphemeralHandle::GroupPeer {
            group: GroupNumber(0),
            peer: PeerNumber(1),
        };
        let other = store.create_contact(Contact::new());
        index.attach_handle(&mut store, other, peer).unwrap();

        // scoped to a group nobody has resolved yet
        let elsewhere = PublicKey([8; 32]);
        let mut orphan = Contact::new();
        orphan.raw_id = Some(PublicKey([3; 32]));
        orphan.raw_scope = Some(elsewhere);
        let orphan = store.create_contact(orphan);
        index.register_placeholder(Scope::Group(elsewhere), PublicKey([3; 32]), orphan);

        let rebuilt = IdentityIndex::rebuild(&store);
        assert_eq!(rebuilt.by_handle(&gh), Some(group));
        assert_eq!(rebuilt.by_handle(&peer), Some(other));
        assert_eq!(rebuilt.by_key(&ContactKey::Group(chat)), Some(group));
        assert_eq!(
            rebuilt.placeholder(Scope::Group(chat), &PublicKey([3; 32])),
            Some(member)
        );
        assert_eq!(rebuilt.placeholder(Scope::Global, &PublicKey([3; 32])), None);
        assert_eq!(
            rebuilt.placeholder(Scope::Group(elsewhere), &PublicKey([3; 32])),
            Some(orphan)
        );
    }
}
