use thiserror::Error;

use tessel_shared::types::{FriendNumber, GroupNumber, PeerNumber, TransferNumber};

/// Failures reported by the transport for queries and commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown friend {0}")]
    FriendNotFound(FriendNumber),

    #[error("Unknown group {0}")]
    GroupNotFound(GroupNumber),

    #[error("Unknown peer {peer} in group {group}")]
    PeerNotFound { group: GroupNumber, peer: PeerNumber },

    #[error("Unknown transfer {transfer} for friend {friend}")]
    TransferNotFound {
        friend: FriendNumber,
        transfer: TransferNumber,
    },

    #[error("Friend {0} is not connected")]
    NotConnected(FriendNumber),

    #[error("Send queue full")]
    SendQueueFull,

    #[error("Command rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
