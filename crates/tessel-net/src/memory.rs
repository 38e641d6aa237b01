//! In-process transport.
//!
//! Keeps friends, groups and transfers in plain maps, records every command
//! it receives, and can be told to reject specific commands. Used by the
//! test suites and by the demo node in place of a real network.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use tessel_shared::types::{
    ConnectionMode, ContentId, ContentKind, FileControl, FriendNumber, GroupNumber, MessageKind,
    PeerNumber, PublicKey, TransferNumber,
};

use crate::error::{Result, TransportError};
use crate::transport::Transport;

#[derive(Debug, Clone)]
struct FriendInfo {
    key: PublicKey,
    name: String,
    status_message: String,
    last_online: Option<DateTime<Utc>>,
    connection: ConnectionMode,
    next_transfer: u32,
}

#[derive(Debug, Clone)]
struct PeerInfo {
    key: PublicKey,
    name: String,
    connection: ConnectionMode,
}

#[derive(Debug, Clone)]
struct GroupInfo {
    chat_id: PublicKey,
    name: String,
    connected: bool,
    self_peer: Option<PeerNumber>,
    peers: HashMap<PeerNumber, PeerInfo>,
    next_peer: u32,
}

/// A command the core issued, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentCommand {
    FriendAdd {
        key: PublicKey,
    },
    FriendMessage {
        friend: FriendNumber,
        text: String,
    },
    GroupMessage {
        group: GroupNumber,
        text: String,
    },
    GroupPrivateMessage {
        group: GroupNumber,
        peer: PeerNumber,
        text: String,
    },
    GroupInviteAccept {
        friend: FriendNumber,
    },
    FileSend {
        friend: FriendNumber,
        transfer: TransferNumber,
        size: u64,
        name: String,
    },
    FileControl {
        friend: FriendNumber,
        transfer: TransferNumber,
        control: FileControl,
    },
    FileChunk {
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        data: Vec<u8>,
    },
}

/// Commands the transport should reject.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitches {
    pub messages: bool,
    pub file_send: bool,
    pub file_control: bool,
    pub send_chunk: bool,
    pub friend_add: bool,
    pub invite_accept: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    self_key: PublicKey,
    self_name: String,
    friends: HashMap<FriendNumber, FriendInfo>,
    groups: HashMap<GroupNumber, GroupInfo>,
    file_ids: HashMap<(FriendNumber, TransferNumber), ContentId>,
    pending_invites: HashMap<PublicKey, String>,
    next_friend: u32,
    next_group: u32,
    next_message_id: u32,
    sent: Vec<SentCommand>,
    pub fail: FailureSwitches,
}

impl MemoryTransport {
    pub fn new(self_key: PublicKey, self_name: impl Into<String>) -> Self {
        Self {
            self_key,
            self_name: self_name.into(),
            friends: HashMap::new(),
            groups: HashMap::new(),
            file_ids: HashMap::new(),
            pending_invites: HashMap::new(),
            next_friend: 0,
            next_group: 0,
            next_message_id: 1,
            sent: Vec::new(),
            fail: FailureSwitches::default(),
        }
    }

    /// Add a friend under the next free handle.
    pub fn add_friend(&mut self, key: PublicKey, name: impl Into<String>) -> FriendNumber {
        let friend = FriendNumber(self.next_friend);
        self.next_friend += 1;
        self.insert_friend(friend, key, name);
        friend
    }

    /// Add (or replace) a friend under an explicit handle.
    pub fn insert_friend(&mut self, friend: FriendNumber, key: PublicKey, name: impl Into<String>) {
        self.friends.insert(
            friend,
            FriendInfo {
                key,
                name: name.into(),
                status_message: String::new(),
                last_online: None,
                connection: ConnectionMode::Direct,
                next_transfer: 0,
            },
        );
        self.next_friend = self.next_friend.max(friend.0 + 1);
        debug!(friend = %friend, key = %key.short(), "memory transport: friend added");
    }

    /// Forget a friend handle, as the network does when a session ends.
    pub fn drop_friend(&mut self, friend: FriendNumber) {
        self.friends.remove(&friend);
        self.file_ids.retain(|(f, _), _| *f != friend);
    }

    pub fn set_friend_connection(&mut self, friend: FriendNumber, connection: ConnectionMode) {
        if let Some(info) = self.friends.get_mut(&friend) {
            info.connection = connection;
        }
    }

    pub fn set_friend_status_message(&mut self, friend: FriendNumber, message: impl Into<String>) {
        if let Some(info) = self.friends.get_mut(&friend) {
            info.status_message = message.into();
        }
    }

    pub fn set_friend_last_online(&mut self, friend: FriendNumber, at: DateTime<Utc>) {
        if let Some(info) = self.friends.get_mut(&friend) {
            info.last_online = Some(at);
        }
    }

    /// Add a joined group. The local account joins as the first peer.
    pub fn add_group(&mut self, chat_id: PublicKey, name: impl Into<String>) -> GroupNumber {
        let group = GroupNumber(self.next_group);
        self.next_group += 1;
        self.insert_group(group, chat_id, name);
        group
    }

    pub fn insert_group(&mut self, group: GroupNumber, chat_id: PublicKey, name: impl Into<String>) {
        let self_peer = PeerNumber(0);
        let mut peers = HashMap::new();
        peers.insert(
            self_peer,
            PeerInfo {
                key: self.self_key,
                name: self.self_name.clone(),
                connection: ConnectionMode::Direct,
            },
        );
        self.groups.insert(
            group,
            GroupInfo {
                chat_id,
                name: name.into(),
                connected: true,
                self_peer: Some(self_peer),
                peers,
                next_peer: 1,
            },
        );
        self.next_group = self.next_group.max(group.0 + 1);
    }

    /// Add a member under the next free peer handle.
    pub fn add_group_peer(
        &mut self,
        group: GroupNumber,
        key: PublicKey,
        name: impl Into<String>,
    ) -> Option<PeerNumber> {
        let info = self.groups.get_mut(&group)?;
        let peer = PeerNumber(info.next_peer);
        info.next_peer += 1;
        info.peers.insert(
            peer,
            PeerInfo {
                key,
                name: name.into(),
                connection: ConnectionMode::Relayed,
            },
        );
        Some(peer)
    }

    pub fn insert_group_peer(
        &mut self,
        group: GroupNumber,
        peer: PeerNumber,
        key: PublicKey,
        name: impl Into<String>,
    ) {
        if let Some(info) = self.groups.get_mut(&group) {
            info.peers.insert(
                peer,
                PeerInfo {
                    key,
                    name: name.into(),
                    connection: ConnectionMode::Relayed,
                },
            );
            info.next_peer = info.next_peer.max(peer.0 + 1);
        }
    }

    pub fn drop_group_peer(&mut self, group: GroupNumber, peer: PeerNumber) {
        if let Some(info) = self.groups.get_mut(&group) {
            info.peers.remove(&peer);
        }
    }

    pub fn set_group_peer_connection(
        &mut self,
        group: GroupNumber,
        peer: PeerNumber,
        connection: ConnectionMode,
    ) {
        if let Some(p) = self.groups.get_mut(&group).and_then(|g| g.peers.get_mut(&peer)) {
            p.connection = connection;
        }
    }

    /// Pretend the transport cannot tell us our own peer id in a group.
    pub fn forget_group_self(&mut self, group: GroupNumber) {
        if let Some(info) = self.groups.get_mut(&group) {
            info.self_peer = None;
        }
    }

    /// Make a group invite acceptable: the group behind `chat_id` will be
    /// joined under `name` when the invite is accepted.
    pub fn offer_group(&mut self, chat_id: PublicKey, name: impl Into<String>) {
        self.pending_invites.insert(chat_id, name.into());
    }

    /// Register the content id of an incoming transfer, as announced by the
    /// remote before the offer event fires.
    pub fn announce_file(&mut self, friend: FriendNumber, transfer: TransferNumber, id: ContentId) {
        self.file_ids.insert((friend, transfer), id);
    }

    /// Every command received so far.
    pub fn sent(&self) -> &[SentCommand] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    fn friend(&self, friend: FriendNumber) -> Result<&FriendInfo> {
        self.friends
            .get(&friend)
            .ok_or(TransportError::FriendNotFound(friend))
    }

    fn group(&self, group: GroupNumber) -> Result<&GroupInfo> {
        self.groups
            .get(&group)
            .ok_or(TransportError::GroupNotFound(group))
    }

    fn peer(&self, group: GroupNumber, peer: PeerNumber) -> Result<&PeerInfo> {
        self.group(group)?
            .peers
            .get(&peer)
            .ok_or(TransportError::PeerNotFound { group, peer })
    }

    fn next_message_id(&mut self) -> u32 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}

impl Transport for MemoryTransport {
    fn self_public_key(&self) -> PublicKey {
        self.self_key
    }

    fn self_name(&self) -> String {
        self.self_name.clone()
    }

    fn friend_list(&self) -> Vec<FriendNumber> {
        let mut list: Vec<_> = self.friends.keys().copied().collect();
        list.sort();
        list
    }

    fn group_list(&self) -> Vec<GroupNumber> {
        let mut list: Vec<_> = self.groups.keys().copied().collect();
        list.sort();
        list
    }

    fn friend_public_key(&self, friend: FriendNumber) -> Result<PublicKey> {
        Ok(self.friend(friend)?.key)
    }

    fn friend_name(&self, friend: FriendNumber) -> Result<String> {
        Ok(self.friend(friend)?.name.clone())
    }

    fn friend_status_message(&self, friend: FriendNumber) -> Result<String> {
        Ok(self.friend(friend)?.status_message.clone())
    }

    fn friend_last_online(&self, friend: FriendNumber) -> Result<Option<DateTime<Utc>>> {
        Ok(self.friend(friend)?.last_online)
    }

    fn friend_connection(&self, friend: FriendNumber) -> Result<ConnectionMode> {
        Ok(self.friend(friend)?.connection)
    }

    fn friend_add_norequest(&mut self, key: &PublicKey) -> Result<FriendNumber> {
        self.sent.push(SentCommand::FriendAdd { key: *key });
        if self.fail.friend_add {
            return Err(TransportError::Rejected("friend add disabled".into()));
        }
        if let Some((friend, _)) = self.friends.iter().find(|(_, info)| info.key == *key) {
            return Ok(*friend);
        }
        Ok(self.add_friend(*key, ""))
    }

    fn friend_send_message(
        &mut self,
        friend: FriendNumber,
        _kind: MessageKind,
        text: &str,
    ) -> Result<u32> {
        self.sent.push(SentCommand::FriendMessage {
            friend,
            text: text.to_string(),
        });
        if self.fail.messages {
            return Err(TransportError::SendQueueFull);
        }
        if !self.friend(friend)?.connection.is_connected() {
            return Err(TransportError::NotConnected(friend));
        }
        Ok(self.next_message_id())
    }

    fn group_chat_id(&self, group: GroupNumber) -> Result<PublicKey> {
        Ok(self.group(group)?.chat_id)
    }

    fn group_name(&self, group: GroupNumber) -> Result<String> {
        Ok(self.group(group)?.name.clone())
    }

    fn group_is_connected(&self, group: GroupNumber) -> Result<bool> {
        Ok(self.group(group)?.connected)
    }

    fn group_self_peer(&self, group: GroupNumber) -> Result<PeerNumber> {
        self.group(group)?
            .self_peer
            .ok_or(TransportError::GroupNotFound(group))
    }

    fn group_peer_public_key(&self, group: GroupNumber, peer: PeerNumber) -> Result<PublicKey> {
        Ok(self.peer(group, peer)?.key)
    }

    fn group_peer_name(&self, group: GroupNumber, peer: PeerNumber) -> Result<String> {
        Ok(self.peer(group, peer)?.name.clone())
    }

    fn group_peer_connection(
        &self,
        group: GroupNumber,
        peer: PeerNumber,
    ) -> Result<ConnectionMode> {
        Ok(self.peer(group, peer)?.connection)
    }

    fn group_invite_accept(
        &mut self,
        friend: FriendNumber,
        invite_data: &[u8],
        _self_name: &str,
        _password: &str,
    ) -> Result<GroupNumber> {
        self.sent.push(SentCommand::GroupInviteAccept { friend });
        if self.fail.invite_accept {
            return Err(TransportError::Rejected("invite accept disabled".into()));
        }
        let chat_id = invite_data
            .get(..tessel_shared::constants::PUBKEY_SIZE)
            .and_then(|bytes| PublicKey::from_slice(bytes).ok())
            .ok_or_else(|| TransportError::Rejected("malformed invite".into()))?;
        let name = self
            .pending_invites
            .remove(&chat_id)
            .ok_or_else(|| TransportError::Rejected("no such invite".into()))?;
        Ok(self.add_group(chat_id, name))
    }

    fn group_send_message(
        &mut self,
        group: GroupNumber,
        _kind: MessageKind,
        text: &str,
    ) -> Result<u32> {
        self.sent.push(SentCommand::GroupMessage {
            group,
            text: text.to_string(),
        });
        if self.fail.messages {
            return Err(TransportError::SendQueueFull);
        }
        self.group(group)?;
        Ok(self.next_message_id())
    }

    fn group_send_private_message(
        &mut self,
        group: GroupNumber,
        peer: PeerNumber,
        _kind: MessageKind,
        text: &str,
    ) -> Result<u32> {
        self.sent.push(SentCommand::GroupPrivateMessage {
            group,
            peer,
            text: text.to_string(),
        });
        if self.fail.messages {
            return Err(TransportError::SendQueueFull);
        }
        self.peer(group, peer)?;
        Ok(self.next_message_id())
    }

    fn file_id(&self, friend: FriendNumber, transfer: TransferNumber) -> Result<ContentId> {
        self.file_ids
            .get(&(friend, transfer))
            .copied()
            .ok_or(TransportError::TransferNotFound { friend, transfer })
    }

    fn file_send(
        &mut self,
        friend: FriendNumber,
        _kind: ContentKind,
        size: u64,
        file_id: &ContentId,
        name: &str,
    ) -> Result<TransferNumber> {
        if self.fail.file_send {
            return Err(TransportError::Rejected("file send disabled".into()));
        }
        let info = self
            .friends
            .get_mut(&friend)
            .ok_or(TransportError::FriendNotFound(friend))?;
        let transfer = TransferNumber(info.next_transfer);
        info.next_transfer += 1;
        self.file_ids.insert((friend, transfer), *file_id);
        self.sent.push(SentCommand::FileSend {
            friend,
            transfer,
            size,
            name: name.to_string(),
        });
        Ok(transfer)
    }

    fn file_control(
        &mut self,
        friend: FriendNumber,
        transfer: TransferNumber,
        control: FileControl,
    ) -> Result<()> {
        self.sent.push(SentCommand::FileControl {
            friend,
            transfer,
            control,
        });
        if self.fail.file_control {
            return Err(TransportError::Rejected("file control disabled".into()));
        }
        self.friend(friend)?;
        Ok(())
    }

    fn file_send_chunk(
        &mut self,
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        data: &[u8],
    ) -> Result<()> {
        self.sent.push(SentCommand::FileChunk {
            friend,
            transfer,
            position,
            data: data.to_vec(),
        });
        if self.fail.send_chunk {
            return Err(TransportError::SendQueueFull);
        }
        self.friend(friend)?;
        Ok(())
    }
}
