use thiserror::Error;

use crate::arena::{ContactId, MessageId, TransferId};
use crate::contacts::ContactKey;

/// Errors produced by the store layer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// No live contact behind this id.
    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),

    /// No live message behind this id.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// No live transfer behind this id.
    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    /// A contact's persistent key is write-once.
    #[error("Contact already carries a different persistent key ({existing:?})")]
    KeyMismatch { existing: ContactKey },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
