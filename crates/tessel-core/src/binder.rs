//! Message/Transfer Binder.
//!
//! A transfer carrying a user-visible file gets a message in the contact's
//! history. Data-channel transfers riding the same transport stay unbound.

use chrono::Utc;
use tracing::{debug, warn};

use tessel_store::{ContactId, Direction, EntityStore, Message, MessageId, TransferId};

use crate::error::Result;

/// Bind a freshly created transfer to a new message, if it is a file share.
/// Outgoing files read as already seen, incoming offers as unread.
pub fn bind(store: &mut EntityStore, transfer: TransferId) -> Result<Option<MessageId>> {
    let t = store.transfer(transfer)?;
    if !t.kind.is_user_visible() {
        debug!(transfer = %transfer, kind = ?t.kind, "Data transfer, no message");
        return Ok(None);
    }
    if let Some(existing) = t.message {
        return Ok(Some(existing));
    }

    let contact = t.contact;
    let direction = t.direction;
    let name = t.info.first_name().unwrap_or_default().to_string();
    let Some(me) = store.contact(contact)?.self_link else {
        warn!(transfer = %transfer, contact = %contact, "No self link, file message skipped");
        return Ok(None);
    };

    let now = Utc::now();
    let (from, to) = endpoints(direction, contact, me);
    let mut m = Message::new(from, to, name);
    m.timestamp = now;
    m.processed_at = Some(now);
    m.transfer = Some(transfer);
    match direction {
        Direction::Outgoing => {
            m.written_at = Some(now);
            m.read_at = Some(now);
        }
        Direction::Incoming => m.unread = true,
    }
    let id = store.create_message(m);
    store.transfer_mut(transfer)?.message = Some(id);

    store.notify_construct(id);
    store.notify_update(transfer);
    Ok(Some(id))
}

fn endpoints(direction: Direction, contact: ContactId, me: ContactId) -> (ContactId, ContactId) {
    match direction {
        Direction::Outgoing => (me, contact),
        Direction::Incoming => (contact, me),
    }
}

/// An incoming file finished: its message becomes unread again and loses
/// our own receipt, since the finished file is what the user should see.
pub fn on_transfer_complete(store: &mut EntityStore, transfer: TransferId) -> Result<()> {
    let t = store.transfer(transfer)?;
    if t.direction != Direction::Incoming {
        return Ok(());
    }
    let Some(id) = t.message else {
        return Ok(());
    };

    let m = store.message_mut(id)?;
    m.unread = true;
    m.read_at = None;
    let me = m.to;
    m.received_by.remove(&me);
    store.notify_update(id);
    Ok(())
}
