//! Events emitted by the transport.
//!
//! One variant per event type, consumed through a single `match` in the
//! core dispatcher so a new event kind is a compile error until handled.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use tessel_shared::types::{
    ConnectionMode, FileControl, FriendNumber, GroupNumber, MessageKind, PeerNumber, PublicKey,
    TransferNumber,
};

/// Why a member left a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupExitKind {
    Quit,
    Timeout,
    Kick,
    /// We left (or were disconnected from) the group ourselves.
    SelfDisconnected,
}

/// Notifications sent *from* the transport to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetEvent {
    // -- friends --
    FriendConnectionStatus {
        friend: FriendNumber,
        status: ConnectionMode,
    },
    FriendName {
        friend: FriendNumber,
        name: String,
    },
    FriendStatusMessage {
        friend: FriendNumber,
        message: String,
    },
    /// Someone asked to become a friend. Carries only the raw key.
    FriendRequest {
        key: PublicKey,
        message: String,
    },
    FriendMessage {
        friend: FriendNumber,
        kind: MessageKind,
        text: String,
    },
    FriendReadReceipt {
        friend: FriendNumber,
        message_id: u32,
    },

    // -- groups --
    GroupInvite {
        friend: FriendNumber,
        invite_data: Vec<u8>,
        group_name: String,
    },
    GroupSelfJoin {
        group: GroupNumber,
    },
    GroupPeerJoin {
        group: GroupNumber,
        peer: PeerNumber,
    },
    GroupPeerExit {
        group: GroupNumber,
        peer: PeerNumber,
        exit: GroupExitKind,
    },
    GroupPeerName {
        group: GroupNumber,
        peer: PeerNumber,
        name: String,
    },
    GroupMessage {
        group: GroupNumber,
        peer: PeerNumber,
        message_id: u32,
        kind: MessageKind,
        text: String,
    },
    GroupPrivateMessage {
        group: GroupNumber,
        peer: PeerNumber,
        kind: MessageKind,
        text: String,
    },

    // -- file transfers --
    /// Incoming file offer.
    FileRecv {
        friend: FriendNumber,
        transfer: TransferNumber,
        kind: u32,
        size: u64,
        name: String,
    },
    FileRecvControl {
        friend: FriendNumber,
        transfer: TransferNumber,
        control: FileControl,
    },
    /// A chunk of an incoming transfer. Empty `data` marks end of stream.
    FileRecvChunk {
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        data: Bytes,
    },
    /// The remote wants `length` bytes of an outgoing transfer. Zero length
    /// marks end of stream.
    FileChunkRequest {
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        length: u64,
    },
}

impl NetEvent {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FriendConnectionStatus { .. } => "friend_connection_status",
            Self::FriendName { .. } => "friend_name",
            Self::FriendStatusMessage { .. } => "friend_status_message",
            Self::FriendRequest { .. } => "friend_request",
            Self::FriendMessage { .. } => "friend_message",
            Self::FriendReadReceipt { .. } => "friend_read_receipt",
            Self::GroupInvite { .. } => "group_invite",
            Self::GroupSelfJoin { .. } => "group_self_join",
            Self::GroupPeerJoin { .. } => "group_peer_join",
            Self::GroupPeerExit { .. } => "group_peer_exit",
            Self::GroupPeerName { .. } => "group_peer_name",
            Self::GroupMessage { .. } => "group_message",
            Self::GroupPrivateMessage { .. } => "group_private_message",
            Self::FileRecv { .. } => "file_recv",
            Self::FileRecvControl { .. } => "file_recv_control",
            Self::FileRecvChunk { .. } => "file_recv_chunk",
            Self::FileChunkRequest { .. } => "file_chunk_request",
        }
    }
}
