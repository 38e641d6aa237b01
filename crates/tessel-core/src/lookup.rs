//! Transfer Lookup Table.
//!
//! Live transfers indexed by (friend handle, transfer handle), one table per
//! direction. Ordered so every transfer of one friend is a contiguous range.

use std::collections::BTreeMap;

use tessel_shared::types::{FriendNumber, TransferNumber};
use tessel_store::{Direction, TransferId, TransferSession};

type Table = BTreeMap<(FriendNumber, TransferNumber), TransferId>;

#[derive(Debug, Default)]
pub struct TransferLookup {
    sending: Table,
    receiving: Table,
}

impl TransferLookup {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, direction: Direction) -> &Table {
        match direction {
            Direction::Outgoing => &self.sending,
            Direction::Incoming => &self.receiving,
        }
    }

    fn table_mut(&mut self, direction: Direction) -> &mut Table {
        match direction {
            Direction::Outgoing => &mut self.sending,
            Direction::Incoming => &mut self.receiving,
        }
    }

    /// Register a live transfer. Returns the transfer previously registered
    /// under the same handles, which should not exist.
    pub fn insert(
        &mut self,
        direction: Direction,
        session: TransferSession,
        id: TransferId,
    ) -> Option<TransferId> {
        self.table_mut(direction)
            .insert((session.friend, session.transfer), id)
    }

    pub fn get(
        &self,
        direction: Direction,
        friend: FriendNumber,
        transfer: TransferNumber,
    ) -> Option<TransferId> {
        self.table(direction).get(&(friend, transfer)).copied()
    }

    /// Outgoing first, then incoming. Control events do not say which.
    pub fn find(&self, friend: FriendNumber, transfer: TransferNumber) -> Option<TransferId> {
        self.get(Direction::Outgoing, friend, transfer)
            .or_else(|| self.get(Direction::Incoming, friend, transfer))
    }

    pub fn remove(
        &mut self,
        direction: Direction,
        friend: FriendNumber,
        transfer: TransferNumber,
    ) -> Option<TransferId> {
        self.table_mut(direction).remove(&(friend, transfer))
    }

    /// Remove and return every transfer registered under `friend`, both
    /// directions, outgoing first.
    pub fn drain_friend(&mut self, friend: FriendNumber) -> Vec<(Direction, TransferSession, TransferId)> {
        let mut drained = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            let table = self.table_mut(direction);
            let keys: Vec<_> = table
                .range((friend, TransferNumber(0))..=(friend, TransferNumber(u32::MAX)))
                .map(|(k, _)| *k)
                .collect();
            for (f, t) in keys {
                if let Some(id) = table.remove(&(f, t)) {
                    drained.push((
                        direction,
                        TransferSession {
                            friend: f,
                            transfer: t,
                        },
                        id,
                    ));
                }
            }
        }
        drained
    }

    pub fn friend_count(&self, friend: FriendNumber) -> usize {
        [&self.sending, &self.receiving]
            .iter()
            .map(|t| {
                t.range((friend, TransferNumber(0))..=(friend, TransferNumber(u32::MAX)))
                    .count()
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.sending.len() + self.receiving.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(f: u32, t: u32) -> TransferSession {
        TransferSession {
            friend: FriendNumber(f),
            transfer: TransferNumber(t),
        }
    }

    #[test]
    fn test_directions_are_separate() {
        let mut lookup = TransferLookup::new();
        lookup.insert(Direction::Outgoing, session(1, 0), TransferId(10));
        lookup.insert(Direction::Incoming, session(1, 0), TransferId(11));

        assert_eq!(
            lookup.get(Direction::Incoming, FriendNumber(1), TransferNumber(0)),
            Some(TransferId(11))
        );
        assert_eq!(lookup.find(FriendNumber(1), TransferNumber(0)), Some(TransferId(10)));

        lookup.remove(Direction::Outgoing, FriendNumber(1), TransferNumber(0));
        assert_eq!(lookup.find(FriendNumber(1), TransferNumber(0)), Some(TransferId(11)));
    }

    #[test]
    fn test_drain_friend_leaves_others() {
        let mut lookup = TransferLookup::new();
        lookup.insert(Direction::Outgoing, session(5, 9), TransferId(1));
        lookup.insert(Direction::Incoming, session(5, 0), TransferId(2));
        lookup.insert(Direction::Incoming, session(5, u32::MAX), TransferId(3));
        lookup.insert(Direction::Outgoing, session(4, 9), TransferId(4));
        lookup.insert(Direction::Outgoing, session(6, 0), TransferId(5));

        let drained = lookup.drain_friend(FriendNumber(5));
        let ids: Vec<_> = drained.iter().map(|(_, _, id)| *id).collect();
        assert_eq!(ids, vec![TransferId(1), TransferId(2), TransferId(3)]);

        assert_eq!(lookup.friend_count(FriendNumber(5)), 0);
        assert_eq!(lookup.len(), 2);
        assert!(lookup.drain_friend(FriendNumber(5)).is_empty());
    }
}
