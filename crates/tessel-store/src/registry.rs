use tokio::sync::mpsc;

use crate::arena::{Arena, ContactId, MessageId, TransferId};
use crate::contacts::Contact;
use crate::error::{Result, StoreError};
use crate::events::{EntityRef, ObserverBus, StoreEvent};
use crate::messages::Message;
use crate::transfers::Transfer;

/// Owns every entity and the observer bus.
///
/// Creation does not notify on its own: callers attach all attributes
/// first and then call [`EntityStore::notify_construct`], so observers never
/// see a half-built entity.
#[derive(Debug, Default)]
pub struct EntityStore {
    contacts: Arena<ContactId, Contact>,
    messages: Arena<MessageId, Message>,
    transfers: Arena<TransferId, Transfer>,
    bus: ObserverBus,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.bus.subscribe()
    }

    // ---- Contacts ----

    pub fn create_contact(&mut self, contact: Contact) -> ContactId {
        self.contacts.insert(contact)
    }

    pub fn contact(&self, id: ContactId) -> Result<&Contact> {
        self.contacts.get(id).ok_or(StoreError::ContactNotFound(id))
    }

    pub fn contact_mut(&mut self, id: ContactId) -> Result<&mut Contact> {
        self.contacts.get_mut(id).ok_or(StoreError::ContactNotFound(id))
    }

    pub fn contacts(&self) -> impl Iterator<Item = (ContactId, &Contact)> {
        self.contacts.iter()
    }

    pub fn find_contact(&self, pred: impl FnMut(&Contact) -> bool) -> Option<ContactId> {
        self.contacts.find(pred)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    // ---- Messages ----

    pub fn create_message(&mut self, message: Message) -> MessageId {
        self.messages.insert(message)
    }

    pub fn message(&self, id: MessageId) -> Result<&Message> {
        self.messages.get(id).ok_or(StoreError::MessageNotFound(id))
    }

    pub fn message_mut(&mut self, id: MessageId) -> Result<&mut Message> {
        self.messages.get_mut(id).ok_or(StoreError::MessageNotFound(id))
    }

    pub fn messages(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        self.messages.iter()
    }

    pub fn find_message(&self, pred: impl FnMut(&Message) -> bool) -> Option<MessageId> {
        self.messages.find(pred)
    }

    // ---- Transfers ----

    pub fn create_transfer(&mut self, transfer: Transfer) -> TransferId {
        self.transfers.insert(transfer)
    }

    pub fn transfer(&self, id: TransferId) -> Result<&Transfer> {
        self.transfers.get(id).ok_or(StoreError::TransferNotFound(id))
    }

    pub fn transfer_mut(&mut self, id: TransferId) -> Result<&mut Transfer> {
        self.transfers.get_mut(id).ok_or(StoreError::TransferNotFound(id))
    }

    pub fn transfers(&self) -> impl Iterator<Item = (TransferId, &Transfer)> {
        self.transfers.iter()
    }

    // ---- Lifecycle ----

    /// Remove an entity and announce it. Returns false if it was not live.
    pub fn destroy(&mut self, entity: EntityRef) -> bool {
        let removed = match entity {
            EntityRef::Contact(id) => self.contacts.remove(id).is_some(),
            EntityRef::Message(id) => self.messages.remove(id).is_some(),
            EntityRef::Transfer(id) => self.transfers.remove(id).is_some(),
        };
        if removed {
            self.bus.emit(StoreEvent::Destroy(entity));
        }
        removed
    }

    pub fn notify_construct(&mut self, entity: impl Into<EntityRef>) {
        self.bus.emit(StoreEvent::Construct(entity.into()));
    }

    pub fn notify_update(&mut self, entity: impl Into<EntityRef>) {
        self.bus.emit(StoreEvent::Update(entity.into()));
    }
}

impl From<ContactId> for EntityRef {
    fn from(id: ContactId) -> Self {
        Self::Contact(id)
    }
}

impl From<MessageId> for EntityRef {
    fn from(id: MessageId) -> Self {
        Self::Message(id)
    }
}

impl From<TransferId> for EntityRef {
    fn from(id: TransferId) -> Self {
        Self::Transfer(id)
    }
}
