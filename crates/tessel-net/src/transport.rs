use chrono::{DateTime, Utc};

use tessel_shared::types::{
    ConnectionMode, ContentId, ContentKind, FileControl, FriendNumber, GroupNumber, MessageKind,
    PeerNumber, PublicKey, TransferNumber,
};

use crate::error::Result;

/// The command and query surface of the network layer.
///
/// Queries take `&self`, commands take `&mut self`. Every call is expected
/// to return promptly; the core runs on a single event thread and does not
/// retry failed commands.
pub trait Transport {
    // -- self --

    fn self_public_key(&self) -> PublicKey;
    fn self_name(&self) -> String;
    fn friend_list(&self) -> Vec<FriendNumber>;
    fn group_list(&self) -> Vec<GroupNumber>;

    // -- friends --

    fn friend_public_key(&self, friend: FriendNumber) -> Result<PublicKey>;
    fn friend_name(&self, friend: FriendNumber) -> Result<String>;
    fn friend_status_message(&self, friend: FriendNumber) -> Result<String>;
    /// Last time the friend was seen online, if the transport remembers it.
    fn friend_last_online(&self, friend: FriendNumber) -> Result<Option<DateTime<Utc>>>;
    fn friend_connection(&self, friend: FriendNumber) -> Result<ConnectionMode>;

    /// Add a friend by key without sending a request (accepting theirs).
    fn friend_add_norequest(&mut self, key: &PublicKey) -> Result<FriendNumber>;
    /// Returns the protocol message id.
    fn friend_send_message(
        &mut self,
        friend: FriendNumber,
        kind: MessageKind,
        text: &str,
    ) -> Result<u32>;

    // -- groups --

    fn group_chat_id(&self, group: GroupNumber) -> Result<PublicKey>;
    fn group_name(&self, group: GroupNumber) -> Result<String>;
    fn group_is_connected(&self, group: GroupNumber) -> Result<bool>;
    fn group_self_peer(&self, group: GroupNumber) -> Result<PeerNumber>;
    fn group_peer_public_key(&self, group: GroupNumber, peer: PeerNumber) -> Result<PublicKey>;
    fn group_peer_name(&self, group: GroupNumber, peer: PeerNumber) -> Result<String>;
    fn group_peer_connection(&self, group: GroupNumber, peer: PeerNumber)
        -> Result<ConnectionMode>;

    fn group_invite_accept(
        &mut self,
        friend: FriendNumber,
        invite_data: &[u8],
        self_name: &str,
        password: &str,
    ) -> Result<GroupNumber>;
    fn group_send_message(
        &mut self,
        group: GroupNumber,
        kind: MessageKind,
        text: &str,
    ) -> Result<u32>;
    fn group_send_private_message(
        &mut self,
        group: GroupNumber,
        peer: PeerNumber,
        kind: MessageKind,
        text: &str,
    ) -> Result<u32>;

    // -- file transfers --

    /// Content id the remote announced for an incoming transfer.
    fn file_id(&self, friend: FriendNumber, transfer: TransferNumber) -> Result<ContentId>;
    /// Begin an outgoing transfer. Returns the transfer handle.
    fn file_send(
        &mut self,
        friend: FriendNumber,
        kind: ContentKind,
        size: u64,
        file_id: &ContentId,
        name: &str,
    ) -> Result<TransferNumber>;
    fn file_control(
        &mut self,
        friend: FriendNumber,
        transfer: TransferNumber,
        control: FileControl,
    ) -> Result<()>;
    fn file_send_chunk(
        &mut self,
        friend: FriendNumber,
        transfer: TransferNumber,
        position: u64,
        data: &[u8],
    ) -> Result<()>;
}
