//! # tessel-core
//!
//! Sits between the transport and the entity store. Network events are
//! resolved to canonical contacts first, then handed to the transfer state
//! machine or the message manager, which mutate the store and notify its
//! observers.
//!
//! Everything runs on one logical thread: [`Core::handle`] processes one
//! event fully before the next, and [`bridge::run`] is the async host loop
//! that feeds it.

pub mod binder;
pub mod bridge;
pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod lookup;
pub mod messages;
pub mod telemetry;
pub mod transfers;

pub use crate::bridge::CoreCommand;
pub use crate::config::CoreConfig;
pub use crate::contacts::ContactResolver;
pub use crate::dispatch::Core;
pub use crate::error::{CoreError, Result};
pub use crate::index::{IdentityIndex, Scope};
pub use crate::lookup::TransferLookup;
pub use crate::messages::MessageManager;
pub use crate::transfers::{Destination, Offer, OutgoingFile, TransferManager};
