//! # tessel-store
//!
//! In-memory entity store for contacts, messages and transfers.
//!
//! Entities live in arenas and refer to each other by typed index, so the
//! cyclic contact graph (parent, children, self links) needs no owning
//! pointers. Every mutation the caller wants observed is announced on the
//! [`ObserverBus`] as a construct/update/destroy notification.

pub mod arena;
pub mod contacts;
pub mod events;
pub mod file;
pub mod messages;
pub mod registry;
pub mod transfers;

mod error;

pub use arena::{Arena, ContactId, EntityId, MessageId, TransferId};
pub use contacts::{Contact, ContactKey, ContactTags, EphemeralHandle, IncomingRequest};
pub use error::{Result, StoreError};
pub use events::{EntityRef, ObserverBus, StoreEvent};
pub use file::{AccessMode, FileAccess, FsFile, MemFile};
pub use messages::{Message, ProtocolMessageId};
pub use registry::EntityStore;
pub use transfers::{Direction, FileEntry, FileInfo, Transfer, TransferSession, TransferState};
