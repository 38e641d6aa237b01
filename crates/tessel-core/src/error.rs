use thiserror::Error;

use tessel_net::TransportError;
use tessel_store::{ContactId, StoreError, TransferId};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The contact has no live transport session to act through.
    #[error("Contact {0} is not connected")]
    NotConnected(ContactId),

    /// The contact has no resolved self link.
    #[error("Contact {0} has no self contact")]
    MissingSelf(ContactId),

    #[error("Contact {0} has no pending request")]
    NoPendingRequest(ContactId),

    #[error("Cannot message contact {contact}: {reason}")]
    InvalidTarget {
        contact: ContactId,
        reason: &'static str,
    },

    #[error("Transfer {0} has no live session")]
    NoSession(TransferId),

    #[error("Transfer {0} is not an incoming transfer")]
    NotIncoming(TransferId),

    #[error("Transfer {0} already has an open file")]
    SinkAlreadyOpen(TransferId),

    #[error("File for transfer {0} is not usable")]
    BadFile(TransferId),

    #[error("Malformed invite: {0}")]
    MalformedInvite(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
