//! Typed event dispatch.
//!
//! [`Core`] owns the store, the transport and every component. Each
//! [`NetEvent`] goes through one exhaustive `match`: the resolver runs
//! first to find the contact, then the transfer state machine or the
//! message manager acts on it.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use tessel_net::{NetEvent, Transport};
use tessel_shared::types::{ContentKind, GroupNumber, MessageKind, PublicKey};
use tessel_store::{ContactId, EntityStore, MessageId, StoreEvent, TransferId};

use crate::binder;
use crate::config::CoreConfig;
use crate::contacts::ContactResolver;
use crate::error::Result;
use crate::index::Scope;
use crate::messages::MessageManager;
use crate::transfers::{Destination, Offer, OutgoingFile, TransferManager};

pub struct Core<T: Transport> {
    store: EntityStore,
    net: T,
    resolver: ContactResolver,
    transfers: TransferManager,
    messages: MessageManager,
    config: CoreConfig,
}

impl<T: Transport> Core<T> {
    /// Build the core over `net`, pulling in every friend and group the
    /// transport already knows.
    pub fn new(net: T, config: CoreConfig) -> Result<Self> {
        let mut store = EntityStore::new();
        let resolver = ContactResolver::new(&mut store, &net, &config)?;
        Ok(Self {
            store,
            net,
            resolver,
            transfers: TransferManager::new(&config),
            messages: MessageManager::new(),
            config,
        })
    }

    // ---- Accessors ----

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.net
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.net
    }

    pub fn resolver(&self) -> &ContactResolver {
        &self.resolver
    }

    pub fn transfers(&self) -> &TransferManager {
        &self.transfers
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn self_contact(&self) -> ContactId {
        self.resolver.self_contact()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.subscribe()
    }

    // ---- Events ----

    /// Process one transport event fully. Failures are logged, never
    /// propagated: the next event must still be handled.
    pub fn handle(&mut self, event: NetEvent) {
        let kind = event.kind();
        if let Err(e) = self.dispatch(event) {
            warn!(event = kind, error = %e, "Event handling failed");
        }
    }

    fn dispatch(&mut self, event: NetEvent) -> Result<()> {
        let Self {
            store,
            net,
            resolver,
            transfers,
            messages,
            ..
        } = self;

        match event {
            NetEvent::FriendConnectionStatus { friend, status } => {
                // transfers go first, while the handle is still indexed
                if !status.is_connected() {
                    transfers.on_friend_disconnect(store, friend);
                }
                resolver.on_friend_connection(store, &*net, friend, status)?;
            }
            NetEvent::FriendName { friend, name } => {
                resolver.on_friend_name(store, &*net, friend, name)?;
            }
            NetEvent::FriendStatusMessage { friend, message } => {
                resolver.on_friend_status_message(store, &*net, friend, message)?;
            }
            NetEvent::FriendRequest { key, message } => {
                resolver.on_friend_request(store, key, message)?;
            }
            NetEvent::FriendMessage { friend, kind, text } => {
                let contact = resolver.resolve_friend(store, &*net, friend)?;
                messages.on_friend_message(store, contact, kind, &text)?;
            }
            NetEvent::FriendReadReceipt { friend, message_id } => {
                let contact = resolver.resolve_friend(store, &*net, friend)?;
                messages.on_read_receipt(store, contact, message_id)?;
            }

            NetEvent::GroupInvite {
                friend,
                invite_data,
                group_name,
            } => {
                resolver.on_group_invite(store, friend, invite_data, group_name)?;
            }
            NetEvent::GroupSelfJoin { group } => {
                resolver.on_group_self_join(store, &*net, group)?;
            }
            NetEvent::GroupPeerJoin { group, peer } => {
                resolver.on_group_peer_join(store, &*net, group, peer)?;
            }
            NetEvent::GroupPeerExit { group, peer, exit } => {
                resolver.on_group_peer_exit(store, &*net, group, peer, exit)?;
            }
            NetEvent::GroupPeerName { group, peer, name } => {
                resolver.on_group_peer_name(store, &*net, group, peer, name)?;
            }
            NetEvent::GroupMessage {
                group,
                peer,
                message_id,
                kind,
                text,
            } => {
                let group_id = resolver.resolve_group(store, &*net, group)?;
                let sender = resolver.resolve_group_peer(store, &*net, group, peer)?;
                messages.on_group_message(store, group_id, sender, message_id, kind, &text)?;
            }
            NetEvent::GroupPrivateMessage {
                group,
                peer,
                kind,
                text,
            } => {
                let sender = resolver.resolve_group_peer(store, &*net, group, peer)?;
                messages.on_group_private_message(store, sender, kind, &text)?;
            }

            NetEvent::FileRecv {
                friend,
                transfer,
                kind,
                size,
                name,
            } => {
                let contact = resolver.resolve_friend(store, &*net, friend)?;
                let offer = Offer {
                    friend,
                    transfer,
                    kind: ContentKind::from_raw(kind),
                    size,
                    name,
                };
                if let Some(id) = transfers.on_offer(store, &*net, contact, offer)? {
                    binder::bind(store, id)?;
                }
            }
            NetEvent::FileRecvControl {
                friend,
                transfer,
                control,
            } => {
                transfers.on_control(store, friend, transfer, control)?;
            }
            NetEvent::FileRecvChunk {
                friend,
                transfer,
                position,
                data,
            } => {
                let finished =
                    transfers.on_chunk(store, &mut *net, friend, transfer, position, &data)?;
                if let Some(id) = finished {
                    binder::on_transfer_complete(store, id)?;
                }
            }
            NetEvent::FileChunkRequest {
                friend,
                transfer,
                position,
                length,
            } => {
                transfers.on_chunk_request(store, &mut *net, friend, transfer, position, length)?;
            }
        }
        Ok(())
    }

    /// Periodic work driven by the host loop.
    pub fn tick(&mut self, elapsed: Duration) {
        self.resolver.tick(&mut self.store, &self.net, elapsed);
    }

    // ---- Local operations ----

    pub fn send_text(&mut self, contact: ContactId, text: &str, kind: MessageKind) -> Result<MessageId> {
        self.messages
            .send_text(&mut self.store, &mut self.net, contact, text, kind)
    }

    /// Offer a file to a friend. The file message is bound right away.
    pub fn send_file(&mut self, contact: ContactId, file: OutgoingFile) -> Result<TransferId> {
        let id = self
            .transfers
            .initiate(&mut self.store, &mut self.net, contact, file)?;
        if let Err(e) = binder::bind(&mut self.store, id) {
            warn!(transfer = %id, error = %e, "Could not bind file message");
        }
        Ok(id)
    }

    pub fn send_path(&mut self, contact: ContactId, path: impl AsRef<Path>) -> Result<TransferId> {
        let file = OutgoingFile::from_path(path)?;
        self.send_file(contact, file)
    }

    pub fn accept(&mut self, transfer: TransferId, destination: Destination) -> Result<()> {
        self.transfers
            .accept(&mut self.store, &mut self.net, transfer, destination)
    }

    pub fn accept_default(&mut self, transfer: TransferId) -> Result<()> {
        self.transfers
            .accept_default(&mut self.store, &mut self.net, transfer)
    }

    pub fn pause(&mut self, transfer: TransferId) -> Result<()> {
        self.transfers.pause(&mut self.store, &mut self.net, transfer)
    }

    pub fn resume(&mut self, transfer: TransferId) -> Result<()> {
        self.transfers.resume(&mut self.store, &mut self.net, transfer)
    }

    pub fn cancel(&mut self, transfer: TransferId) -> Result<()> {
        self.transfers.cancel(&mut self.store, &mut self.net, transfer)
    }

    /// Accept a pending friend request or group invite under our own name.
    pub fn accept_request(&mut self, contact: ContactId, password: &str) -> Result<()> {
        let self_name = self.net.self_name();
        self.resolver
            .accept_request(&mut self.store, &mut self.net, contact, &self_name, password)
    }

    /// Reference an identity by raw key before the network reports it.
    pub fn placeholder(&mut self, scope: Scope, raw: PublicKey) -> Result<ContactId> {
        debug!(?scope, key = %raw.short(), "Placeholder requested");
        self.resolver.placeholder(&mut self.store, scope, raw)
    }

    pub fn resolve_group_peer_by_key(
        &mut self,
        group: GroupNumber,
        peer_key: PublicKey,
    ) -> Result<ContactId> {
        self.resolver
            .resolve_group_peer_by_key(&mut self.store, &self.net, group, peer_key)
    }
}
