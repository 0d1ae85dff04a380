//! The undo journal.
//!
//! Every state change made while an operation runs is recorded with the
//! value it overwrote. A failed operation is reverted by undoing changes
//! back to its [`Checkpoint`]; a committed one is turned into a
//! [`WriteBatch`](pubgraph_store::WriteBatch) from the set of touched keys.

use pubgraph_access::{AccessChange, AccessJournal};
use pubgraph_core::{Address, Publication, PublicationKey};

/// One overwritten value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Access(AccessChange),
    Publication {
        key: PublicationKey,
        prev: Option<Publication>,
    },
    ModuleSlot {
        module: Address,
        key: Vec<u8>,
        prev: Option<Vec<u8>>,
    },
    Balance {
        currency: Address,
        holder: Address,
        prev: u128,
    },
    CollectCount {
        publication: PublicationKey,
        prev: u64,
    },
}

/// Position an operation can be reverted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub(crate) changes: usize,
    pub(crate) events: usize,
}

#[derive(Debug, Default)]
pub struct Journal {
    changes: Vec<Change>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Remove and return changes recorded after `len`, newest first.
    pub(crate) fn unwind(&mut self, len: usize) -> impl Iterator<Item = Change> + '_ {
        let len = len.min(self.changes.len());
        self.changes.drain(len..).rev()
    }

    pub(crate) fn clear(&mut self) {
        self.changes.clear();
    }
}

impl AccessJournal for Journal {
    fn record(&mut self, change: AccessChange) {
        self.changes.push(Change::Access(change));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::ProfileId;

    #[test]
    fn test_unwind_is_newest_first() {
        let mut journal = Journal::new();
        journal.record(AccessChange::ProfileCreated {
            profile_id: ProfileId(1),
        });
        journal.push(Change::CollectCount {
            publication: PublicationKey::from((1, 1)),
            prev: 0,
        });
        journal.push(Change::CollectCount {
            publication: PublicationKey::from((1, 1)),
            prev: 1,
        });

        let undone: Vec<Change> = journal.unwind(1).collect();
        assert_eq!(undone.len(), 2);
        assert!(matches!(undone[0], Change::CollectCount { prev: 1, .. }));
        assert_eq!(journal.len(), 1);
    }
}
