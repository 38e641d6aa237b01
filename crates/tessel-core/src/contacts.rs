//! Contact Resolver.
//!
//! Maps transport handles and keys to one canonical contact per identity.
//! Every `resolve_*` call follows the same ladder:
//!
//! 1. live handle in the index (hot path)
//! 2. persistent key from the transport
//! 3. existing contact with that key: attach the handle
//! 4. placeholder with the raw key in the right scope: merge into it
//! 5. otherwise create
//! 6. link the contact to "me" in its context
//!
//! Steps 4 and 5 announce the contact once, after all of its attributes are
//! in place.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn};

use tessel_net::{GroupExitKind, Transport};
use tessel_shared::constants::{GROUP_INVITE_DATA_SIZE, PUBKEY_SIZE};
use tessel_shared::types::{ConnectionMode, FriendNumber, GroupNumber, PeerNumber, PublicKey};
use tessel_store::{Contact, ContactId, ContactKey, EntityStore, EphemeralHandle, IncomingRequest};

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::index::{IdentityIndex, Scope};

pub struct ContactResolver {
    index: IdentityIndex,
    self_contact: ContactId,
    unknown_name: String,
    poll_interval: Duration,
    poll_elapsed: Duration,
}

fn stamp_seen(contact: &mut Contact, seen: DateTime<Utc>) {
    contact.first_seen = Some(contact.first_seen.map_or(seen, |f| f.min(seen)));
    contact.last_seen = Some(contact.last_seen.map_or(seen, |l| l.max(seen)));
}

fn group_connection(connected: bool) -> ConnectionMode {
    if connected {
        ConnectionMode::Relayed
    } else {
        ConnectionMode::Disconnected
    }
}

impl ContactResolver {
    /// Create the account root, then pull in every friend and group the
    /// transport already knows.
    pub fn new(store: &mut EntityStore, net: &dyn Transport, config: &CoreConfig) -> Result<Self> {
        let mut root = Contact::new();
        root.tags.root = true;
        root.tags.self_strong = true;
        root.name = Some(net.self_name());
        root.connection = ConnectionMode::Direct;
        stamp_seen(&mut root, Utc::now());
        let self_contact = store.create_contact(root);

        let mut index = IdentityIndex::new();
        index.attach_key(store, self_contact, ContactKey::Account(net.self_public_key()))?;
        store.contact_mut(self_contact)?.self_link = Some(self_contact);
        store.notify_construct(self_contact);

        let mut resolver = Self {
            index,
            self_contact,
            unknown_name: config.unknown_name.clone(),
            poll_interval: config.group_poll_interval,
            poll_elapsed: Duration::ZERO,
        };

        let friends = net.friend_list();
        for &friend in &friends {
            if let Err(e) = resolver.resolve_friend(store, net, friend) {
                warn!(friend = %friend, error = %e, "Failed to load friend");
            }
        }

        let groups = net.group_list();
        for &group in &groups {
            if let Err(e) = resolver.resolve_group(store, net, group) {
                warn!(group = %group, error = %e, "Failed to load group");
            }
        }

        info!(
            key = %net.self_public_key().short(),
            friends = friends.len(),
            groups = groups.len(),
            "Contact resolver ready"
        );

        Ok(resolver)
    }

    pub fn self_contact(&self) -> ContactId {
        self.self_contact
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    /// Contact currently holding a live friend handle, without asking the
    /// transport.
    pub fn friend_contact(&self, friend: FriendNumber) -> Option<ContactId> {
        self.index.by_handle(&EphemeralHandle::Friend(friend))
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    pub fn resolve_friend(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        friend: FriendNumber,
    ) -> Result<ContactId> {
        let handle = EphemeralHandle::Friend(friend);
        if let Some(id) = self.index.by_handle(&handle) {
            return Ok(id);
        }

        let pk = net.friend_public_key(friend).map_err(|e| {
            error!(friend = %friend, error = %e, "Transport cannot describe friend");
            e
        })?;
        let key = ContactKey::Friend(pk);

        if let Some(id) = self.index.by_key(&key) {
            self.bind_handle(store, id, handle)?;
            debug!(contact = %id, friend = %friend, "Friend back online");
            store.notify_update(id);
            return Ok(id);
        }

        let (id, merged) = self.claim(store, Scope::Global, &pk)?;
        self.index.attach_key(store, id, key)?;
        self.bind_handle(store, id, handle)?;

        let name = net.friend_name(friend).ok().filter(|n| !n.is_empty());
        let status = net.friend_status_message(friend).ok().filter(|s| !s.is_empty());
        let connection = net.friend_connection(friend).ok();
        let seen = net
            .friend_last_online(friend)
            .ok()
            .flatten()
            .unwrap_or_else(Utc::now);

        let c = store.contact_mut(id)?;
        c.tags.big = true;
        c.self_link = Some(self.self_contact);
        if let Some(name) = name {
            c.name = Some(name);
        } else if c.name.is_none() {
            c.name = Some(self.unknown_name.clone());
        }
        if status.is_some() {
            c.status_text = status;
        }
        if let Some(connection) = connection {
            c.connection = connection;
        }
        stamp_seen(c, seen);

        self.announce(store, id, merged, "friend");
        Ok(id)
    }

    pub fn resolve_group(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
    ) -> Result<ContactId> {
        let handle = EphemeralHandle::Group(group);
        if let Some(id) = self.index.by_handle(&handle) {
            return Ok(id);
        }

        let chat_id = net.group_chat_id(group).map_err(|e| {
            error!(group = %group, error = %e, "Transport cannot describe group");
            e
        })?;
        let key = ContactKey::Group(chat_id);

        if let Some(id) = self.index.by_key(&key) {
            self.bind_handle(store, id, handle)?;
            if store.contact(id)?.self_link.is_none() {
                let link = self.resolve_group_self(store, net, group);
                store.contact_mut(id)?.self_link = link;
            }
            debug!(contact = %id, group = %group, "Group rejoined");
            store.notify_update(id);
            return Ok(id);
        }

        let (id, merged) = self.claim(store, Scope::Global, &chat_id)?;
        self.index.attach_key(store, id, key)?;
        // the handle must be indexed before resolving our own member below,
        // which looks the group up again
        self.bind_handle(store, id, handle)?;

        let name = net.group_name(group).ok().filter(|n| !n.is_empty());
        let connected = net.group_is_connected(group).unwrap_or(false);

        let c = store.contact_mut(id)?;
        c.tags.big = true;
        c.tags.group = true;
        if let Some(name) = name {
            c.name = Some(name);
        } else if c.name.is_none() {
            c.name = Some(self.unknown_name.clone());
        }
        c.connection = group_connection(connected);
        stamp_seen(c, Utc::now());

        // observers see the group before its members
        self.announce(store, id, merged, "group");

        if let Some(link) = self.resolve_group_self(store, net, group) {
            store.contact_mut(id)?.self_link = Some(link);
            store.notify_update(id);
        }
        Ok(id)
    }

    pub fn resolve_group_peer(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
        peer: PeerNumber,
    ) -> Result<ContactId> {
        let group_id = self.resolve_group(store, net, group)?;

        let handle = EphemeralHandle::GroupPeer { group, peer };
        if let Some(id) = self.index.by_handle(&handle) {
            return Ok(id);
        }

        let chat_id = self.chat_id_of(store, net, group_id, group)?;
        let peer_key = net.group_peer_public_key(group, peer).map_err(|e| {
            error!(group = %group, peer = %peer, error = %e, "Transport cannot describe group member");
            e
        })?;
        let key = ContactKey::GroupPeer { chat_id, peer_key };

        if let Some(id) = self.index.by_key(&key) {
            self.bind_handle(store, id, handle)?;
            debug!(contact = %id, group = %group, peer = %peer, "Group member back");
            store.notify_update(id);
            return Ok(id);
        }

        let (id, merged) = self.claim(store, Scope::Group(chat_id), &peer_key)?;
        self.index.attach_key(store, id, key)?;
        self.bind_handle(store, id, handle)?;
        self.link_member(store, group_id, id)?;

        let name = net.group_peer_name(group, peer).ok();
        let connection = net.group_peer_connection(group, peer).ok();

        let c = store.contact_mut(id)?;
        if let Some(name) = name {
            c.name = Some(name);
        }
        if let Some(connection) = connection {
            c.connection = connection;
        }
        stamp_seen(c, Utc::now());

        let link = match net.group_self_peer(group) {
            Ok(self_peer) if self_peer == peer => {
                store.contact_mut(id)?.tags.self_strong = true;
                Some(id)
            }
            Ok(_) => self.resolve_group_self(store, net, group),
            Err(e) => {
                warn!(group = %group, error = %e, "Own peer id unknown, self link left unset");
                None
            }
        };
        store.contact_mut(id)?.self_link = link;

        self.announce(store, id, merged, "group member");
        Ok(id)
    }

    /// Resolve a group member by raw key alone, as history references do.
    /// No live handle is searched or attached.
    pub fn resolve_group_peer_by_key(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
        peer_key: PublicKey,
    ) -> Result<ContactId> {
        let group_id = self.resolve_group(store, net, group)?;
        let chat_id = self.chat_id_of(store, net, group_id, group)?;
        let key = ContactKey::GroupPeer { chat_id, peer_key };

        if let Some(id) = self.index.by_key(&key) {
            return Ok(id);
        }

        let (id, merged) = self.claim(store, Scope::Group(chat_id), &peer_key)?;
        self.index.attach_key(store, id, key)?;
        self.link_member(store, group_id, id)?;

        let link = self.resolve_group_self(store, net, group);
        store.contact_mut(id)?.self_link = link;

        self.announce(store, id, merged, "group member (by key)");
        Ok(id)
    }

    /// Reference an identity by raw key before any live event names it.
    /// Returns the keyed contact if one exists, else a placeholder.
    pub fn placeholder(
        &mut self,
        store: &mut EntityStore,
        scope: Scope,
        raw: PublicKey,
    ) -> Result<ContactId> {
        let keyed = match scope {
            Scope::Global => [
                ContactKey::Friend(raw),
                ContactKey::Group(raw),
                ContactKey::Account(raw),
            ]
            .iter()
            .find_map(|k| self.index.by_key(k)),
            Scope::Group(chat_id) => self.index.by_key(&ContactKey::GroupPeer {
                chat_id,
                peer_key: raw,
            }),
        };
        if let Some(id) = keyed.or_else(|| self.index.placeholder(scope, &raw)) {
            return Ok(id);
        }

        let mut c = Contact::new();
        c.raw_id = Some(raw);
        if let Scope::Group(chat_id) = scope {
            c.raw_scope = Some(chat_id);
        }
        let parent = match scope {
            Scope::Global => {
                c.self_link = Some(self.self_contact);
                None
            }
            Scope::Group(chat_id) => self.index.by_key(&ContactKey::Group(chat_id)),
        };
        if parent.is_some() {
            c.parent = parent;
            c.tags.group_member = true;
            c.tags.private = true;
        }

        let id = store.create_contact(c);
        if let Some(parent) = parent {
            store.contact_mut(parent)?.add_child(id);
        }
        self.index.register_placeholder(scope, raw, id);

        debug!(contact = %id, key = %raw.short(), ?scope, "Created placeholder contact");
        store.notify_construct(id);
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    pub fn on_friend_connection(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        friend: FriendNumber,
        status: ConnectionMode,
    ) -> Result<()> {
        let id = self.resolve_friend(store, net, friend)?;

        let c = store.contact_mut(id)?;
        c.connection = status;
        c.last_seen = Some(Utc::now());

        if !status.is_connected() {
            self.index.detach_handle(store, id)?;
            debug!(contact = %id, friend = %friend, "Friend went offline");
        }

        store.notify_update(id);
        Ok(())
    }

    pub fn on_friend_name(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        friend: FriendNumber,
        name: String,
    ) -> Result<()> {
        let id = self.resolve_friend(store, net, friend)?;
        store.contact_mut(id)?.name = Some(name);
        store.notify_update(id);
        Ok(())
    }

    pub fn on_friend_status_message(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        friend: FriendNumber,
        message: String,
    ) -> Result<()> {
        let id = self.resolve_friend(store, net, friend)?;
        store.contact_mut(id)?.status_text = Some(message);
        store.notify_update(id);
        Ok(())
    }

    pub fn on_friend_request(
        &mut self,
        store: &mut EntityStore,
        key: PublicKey,
        message: String,
    ) -> Result<ContactId> {
        let ckey = ContactKey::Friend(key);

        if let Some(id) = self.index.by_key(&ckey) {
            store.contact_mut(id)?.request = Some(IncomingRequest::Friend { message });
            self.index.detach_handle(store, id)?;
            info!(contact = %id, key = %key.short(), "Marked friend contact as requested");
            store.notify_update(id);
            return Ok(id);
        }

        let (id, merged) = self.claim(store, Scope::Global, &key)?;
        self.index.attach_key(store, id, ckey)?;

        let c = store.contact_mut(id)?;
        c.request = Some(IncomingRequest::Friend { message });
        c.tags.big = true;
        c.self_link = Some(self.self_contact);
        stamp_seen(c, Utc::now());

        self.announce(store, id, merged, "friend request");
        Ok(id)
    }

    /// Returns `None` when the group is already known.
    pub fn on_group_invite(
        &mut self,
        store: &mut EntityStore,
        friend: FriendNumber,
        invite_data: Vec<u8>,
        group_name: String,
    ) -> Result<Option<ContactId>> {
        let chat_id = invite_data
            .get(..PUBKEY_SIZE)
            .ok_or_else(|| {
                CoreError::MalformedInvite(format!("{} bytes of invite data", invite_data.len()))
            })
            .and_then(|bytes| {
                PublicKey::from_slice(bytes).map_err(|e| CoreError::MalformedInvite(e.to_string()))
            })?;
        if invite_data.len() != GROUP_INVITE_DATA_SIZE {
            warn!(
                friend = %friend,
                len = invite_data.len(),
                "Unexpected invite data length"
            );
        }

        let key = ContactKey::Group(chat_id);
        if let Some(id) = self.index.by_key(&key) {
            debug!(contact = %id, chat_id = %chat_id.short(), "Already in group from invite");
            return Ok(None);
        }

        let (id, merged) = self.claim(store, Scope::Global, &chat_id)?;
        self.index.attach_key(store, id, key)?;

        let c = store.contact_mut(id)?;
        c.request = Some(IncomingRequest::Group {
            friend,
            invite_data,
        });
        c.tags.big = true;
        c.tags.group = true;
        c.name = Some(group_name);

        self.announce(store, id, merged, "group invite");
        Ok(Some(id))
    }

    /// Accept a pending friend request or group invite. The request stays
    /// pending if the transport refuses.
    pub fn accept_request(
        &mut self,
        store: &mut EntityStore,
        net: &mut dyn Transport,
        contact: ContactId,
        self_name: &str,
        password: &str,
    ) -> Result<()> {
        let c = store.contact(contact)?;
        let request = c
            .request
            .clone()
            .ok_or(CoreError::NoPendingRequest(contact))?;
        let key = c.key().copied();

        match request {
            IncomingRequest::Friend { .. } => {
                let Some(ContactKey::Friend(pk)) = key else {
                    error!(contact = %contact, "Friend request without a friend key");
                    return Err(CoreError::NoPendingRequest(contact));
                };
                let friend = net.friend_add_norequest(&pk).map_err(|e| {
                    warn!(contact = %contact, error = %e, "Failed to accept friend request");
                    e
                })?;
                self.bind_handle(store, contact, EphemeralHandle::Friend(friend))?;
                store.contact_mut(contact)?.request = None;
                info!(contact = %contact, friend = %friend, "Accepted friend request");
            }
            IncomingRequest::Group {
                friend,
                invite_data,
            } => {
                let group = net
                    .group_invite_accept(friend, &invite_data, self_name, password)
                    .map_err(|e| {
                        warn!(contact = %contact, error = %e, "Failed to accept group invite");
                        e
                    })?;
                self.bind_handle(store, contact, EphemeralHandle::Group(group))?;

                match net.group_chat_id(group) {
                    Ok(chat_id) => {
                        if let Err(e) =
                            self.index
                                .attach_key(store, contact, ContactKey::Group(chat_id))
                        {
                            error!(contact = %contact, error = %e, "Joined group does not match invite");
                        }
                    }
                    Err(e) => error!(group = %group, error = %e, "Cannot read chat id of joined group"),
                }

                let link = self.resolve_group_self(store, &*net, group);
                let connected = net.group_is_connected(group).unwrap_or(false);
                let c = store.contact_mut(contact)?;
                c.self_link = link;
                c.connection = group_connection(connected);
                c.request = None;
                info!(contact = %contact, group = %group, "Accepted group invite");
            }
        }

        store.notify_update(contact);
        Ok(())
    }

    pub fn on_group_self_join(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
    ) -> Result<()> {
        let peer = net.group_self_peer(group).map_err(|e| {
            error!(group = %group, error = %e, "Joined group without an own peer id");
            e
        })?;

        let id = self.resolve_group_peer(store, net, group, peer)?;
        let c = store.contact_mut(id)?;
        c.tags.self_strong = true;
        c.connection = ConnectionMode::Direct;
        c.self_link = Some(id);
        store.notify_update(id);

        let group_id = self.resolve_group(store, net, group)?;
        let connected = net.group_is_connected(group).unwrap_or(false);
        let gc = store.contact_mut(group_id)?;
        gc.connection = group_connection(connected);
        if gc.self_link.is_none() {
            gc.self_link = Some(id);
        }
        store.notify_update(group_id);

        info!(group = %group, peer = %peer, "Joined group");
        Ok(())
    }

    pub fn on_group_peer_join(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
        peer: PeerNumber,
    ) -> Result<()> {
        let id = self.resolve_group_peer(store, net, group, peer)?;
        self.bind_handle(store, id, EphemeralHandle::GroupPeer { group, peer })?;

        let connection = net
            .group_peer_connection(group, peer)
            .unwrap_or(ConnectionMode::Disconnected);
        let name = net.group_peer_name(group, peer).ok();

        let c = store.contact_mut(id)?;
        c.connection = connection;
        if let Some(name) = name {
            c.name = Some(name);
        }
        c.last_seen = Some(Utc::now());
        store.notify_update(id);
        Ok(())
    }

    pub fn on_group_peer_exit(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
        peer: PeerNumber,
        exit: GroupExitKind,
    ) -> Result<()> {
        if exit == GroupExitKind::SelfDisconnected {
            let mut members: Vec<ContactId> = self
                .index
                .handles()
                .filter_map(|(handle, id)| match handle {
                    EphemeralHandle::GroupPeer { group: g, .. } if *g == group => Some(*id),
                    _ => None,
                })
                .collect();
            members.sort();

            for &id in &members {
                self.index.detach_handle(store, id)?;
                store.contact_mut(id)?.connection = ConnectionMode::Disconnected;
                store.notify_update(id);
            }

            if let Some(group_id) = self.index.by_handle(&EphemeralHandle::Group(group)) {
                store.contact_mut(group_id)?.connection = ConnectionMode::Disconnected;
                store.notify_update(group_id);
            }

            info!(group = %group, members = members.len(), "Left group, member handles detached");
            return Ok(());
        }

        let handle = EphemeralHandle::GroupPeer { group, peer };
        let id = match self.index.by_handle(&handle) {
            Some(id) => id,
            None => match self.resolve_group_peer(store, net, group, peer) {
                Ok(id) => id,
                Err(e) => {
                    debug!(group = %group, peer = %peer, error = %e, "Exit for untracked group member");
                    return Ok(());
                }
            },
        };

        let c = store.contact_mut(id)?;
        c.connection = ConnectionMode::Disconnected;
        c.last_seen = Some(Utc::now());
        self.index.detach_handle(store, id)?;
        debug!(contact = %id, group = %group, peer = %peer, ?exit, "Group member left");
        store.notify_update(id);
        Ok(())
    }

    pub fn on_group_peer_name(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
        peer: PeerNumber,
        name: String,
    ) -> Result<()> {
        let id = self.resolve_group_peer(store, net, group, peer)?;
        store.contact_mut(id)?.name = Some(name);
        store.notify_update(id);
        Ok(())
    }

    /// Poll group member connection state once per poll interval. The
    /// transport has no event for it.
    pub fn tick(&mut self, store: &mut EntityStore, net: &dyn Transport, elapsed: Duration) {
        self.poll_elapsed += elapsed;
        if self.poll_elapsed < self.poll_interval {
            return;
        }
        self.poll_elapsed = Duration::ZERO;

        let mut members: Vec<(ContactId, GroupNumber, PeerNumber)> = self
            .index
            .handles()
            .filter_map(|(handle, id)| match *handle {
                EphemeralHandle::GroupPeer { group, peer } => Some((*id, group, peer)),
                _ => None,
            })
            .collect();
        members.sort();

        for (id, group, peer) in members {
            match net.group_peer_connection(group, peer) {
                Ok(mode) if mode.is_connected() => {
                    if let Ok(c) = store.contact_mut(id) {
                        if c.connection != mode {
                            c.connection = mode;
                            store.notify_update(id);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => trace!(group = %group, peer = %peer, error = %e, "Poll failed"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The placeholder for `raw` in `scope`, or a fresh contact. The flag is
    /// true for a placeholder.
    fn claim(
        &mut self,
        store: &mut EntityStore,
        scope: Scope,
        raw: &PublicKey,
    ) -> Result<(ContactId, bool)> {
        match self.index.placeholder(scope, raw) {
            Some(id) if store.contact(id).is_ok() => Ok((id, true)),
            _ => Ok((store.create_contact(Contact::new()), false)),
        }
    }

    fn bind_handle(
        &mut self,
        store: &mut EntityStore,
        id: ContactId,
        handle: EphemeralHandle,
    ) -> Result<()> {
        if let Some(displaced) = self.index.attach_handle(store, id, handle)? {
            warn!(contact = %displaced, ?handle, "Handle was still bound to another contact");
            store.notify_update(displaced);
        }
        Ok(())
    }

    fn announce(&self, store: &mut EntityStore, id: ContactId, merged: bool, what: &str) {
        if merged {
            info!(contact = %id, kind = what, "Merged placeholder contact");
            store.notify_update(id);
        } else {
            info!(contact = %id, kind = what, "Created contact");
            store.notify_construct(id);
        }
    }

    fn link_member(
        &mut self,
        store: &mut EntityStore,
        group_id: ContactId,
        id: ContactId,
    ) -> Result<()> {
        let c = store.contact_mut(id)?;
        c.parent = Some(group_id);
        c.tags.group_member = true;
        c.tags.private = true;
        store.contact_mut(group_id)?.add_child(id);
        Ok(())
    }

    fn chat_id_of(
        &self,
        store: &EntityStore,
        net: &dyn Transport,
        group_id: ContactId,
        group: GroupNumber,
    ) -> Result<PublicKey> {
        match store.contact(group_id)?.key() {
            Some(ContactKey::Group(chat_id)) => Ok(*chat_id),
            _ => Ok(net.group_chat_id(group)?),
        }
    }

    /// Our own member contact in `group`. Failures leave the link unset.
    fn resolve_group_self(
        &mut self,
        store: &mut EntityStore,
        net: &dyn Transport,
        group: GroupNumber,
    ) -> Option<ContactId> {
        let peer = match net.group_self_peer(group) {
            Ok(peer) => peer,
            Err(e) => {
                warn!(group = %group, error = %e, "Own peer id unknown, self link left unset");
                return None;
            }
        };
        match self.resolve_group_peer(store, net, group, peer) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(group = %group, peer = %peer, error = %e, "Cannot resolve own group member");
                None
            }
        }
    }
}
