//! Index-addressed entity tables.
//!
//! Slots are never reused, so a stale id can only ever miss, never alias a
//! newer entity.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// A typed index into an [`Arena`].
pub trait EntityId: Copy + Eq + std::fmt::Debug {
    fn from_index(index: u32) -> Self;
    fn index(self) -> usize;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl EntityId for $name {
            fn from_index(index: u32) -> Self {
                Self(index)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Handle of a contact entity
    ContactId
);
entity_id!(
    /// Handle of a message entity
    MessageId
);
entity_id!(
    /// Handle of a transfer entity
    TransferId
);

#[derive(Debug)]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _id: PhantomData<I>,
}

impl<I: EntityId, T> Arena<I, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _id: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> I {
        let id = I::from_index(self.slots.len() as u32);
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let value = self.slots.get_mut(id.index()).and_then(Option::take);
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (I::from_index(i as u32), v)))
    }

    /// Linear scan for the first live entity matching `pred`. Cold path only.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<I> {
        self.iter().find(|(_, v)| pred(v)).map(|(id, _)| id)
    }
}

impl<I: EntityId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}
