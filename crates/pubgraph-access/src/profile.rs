//! Profile ownership bookkeeping.

use std::collections::BTreeMap;

use pubgraph_core::{Address, HubError, ProfileId, ProfileRecord, PubId};

use crate::change::{AccessChange, AccessJournal};

/// All profiles, keyed by id. Profiles are never deleted.
#[derive(Debug, Clone, Default)]
pub struct ProfileBook {
    profiles: BTreeMap<ProfileId, ProfileRecord>,
    last_id: u64,
}

impl ProfileBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, profile_id: ProfileId) -> Option<&ProfileRecord> {
        self.profiles.get(&profile_id)
    }

    /// The profile record, or `TokenDoesNotExist`.
    pub fn require(&self, profile_id: ProfileId) -> Result<&ProfileRecord, HubError> {
        self.profiles
            .get(&profile_id)
            .ok_or(HubError::TokenDoesNotExist(profile_id))
    }

    pub fn exists(&self, profile_id: ProfileId) -> bool {
        self.profiles.contains_key(&profile_id)
    }

    pub fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.profiles.get(&profile_id).map(|p| p.owner)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProfileRecord> {
        self.profiles.values()
    }

    /// Mint the next profile id to `owner`.
    pub fn create(
        &mut self,
        journal: &mut dyn AccessJournal,
        owner: Address,
        now: i64,
    ) -> Result<ProfileId, HubError> {
        if owner.is_zero() {
            return Err(HubError::InvalidParameter("profile owner is the zero address"));
        }
        self.last_id += 1;
        let profile_id = ProfileId(self.last_id);
        self.profiles
            .insert(profile_id, ProfileRecord::new(profile_id, owner, now));
        journal.record(AccessChange::ProfileCreated { profile_id });
        Ok(profile_id)
    }

    pub fn set_owner(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
        owner: Address,
    ) -> Result<(), HubError> {
        let record = self
            .profiles
            .get_mut(&profile_id)
            .ok_or(HubError::TokenDoesNotExist(profile_id))?;
        let prev = std::mem::replace(&mut record.owner, owner);
        journal.record(AccessChange::Owner { profile_id, prev });
        Ok(())
    }

    /// Reserve the next publication id of a profile (`++pubCount`).
    pub fn next_pub_id(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
    ) -> Result<PubId, HubError> {
        let record = self
            .profiles
            .get_mut(&profile_id)
            .ok_or(HubError::TokenDoesNotExist(profile_id))?;
        let prev = record.pub_count;
        record.pub_count = prev
            .checked_add(1)
            .ok_or(HubError::InvalidParameter("publication counter overflow"))?;
        journal.record(AccessChange::PubCount { profile_id, prev });
        Ok(PubId(record.pub_count))
    }

    /// Load a persisted record without journaling.
    pub fn restore(&mut self, record: ProfileRecord) {
        self.last_id = self.last_id.max(record.profile_id.0);
        self.profiles.insert(record.profile_id, record);
    }

    pub(crate) fn undo(&mut self, change: &AccessChange) {
        match change {
            AccessChange::ProfileCreated { profile_id } => {
                self.profiles.remove(profile_id);
                self.last_id = self.last_id.saturating_sub(1);
            }
            AccessChange::PubCount { profile_id, prev } => {
                if let Some(record) = self.profiles.get_mut(profile_id) {
                    record.pub_count = *prev;
                }
            }
            AccessChange::Owner { profile_id, prev } => {
                if let Some(record) = self.profiles.get_mut(profile_id) {
                    record.owner = *prev;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let mut book = ProfileBook::new();
        let mut j = Vec::new();
        let a = book.create(&mut j, Address::derive(b"a"), 1).unwrap();
        let b = book.create(&mut j, Address::derive(b"b"), 2).unwrap();
        assert_eq!(a, ProfileId(1));
        assert_eq!(b, ProfileId(2));
    }

    #[test]
    fn test_pub_ids_dense_and_undoable() {
        let mut book = ProfileBook::new();
        let mut j = Vec::new();
        let p = book.create(&mut j, Address::derive(b"a"), 1).unwrap();
        assert_eq!(book.next_pub_id(&mut j, p).unwrap(), PubId(1));
        assert_eq!(book.next_pub_id(&mut j, p).unwrap(), PubId(2));

        book.undo(&j.pop().unwrap());
        assert_eq!(book.get(p).unwrap().pub_count, 1);
        assert_eq!(book.next_pub_id(&mut j, p).unwrap(), PubId(2));
    }

    #[test]
    fn test_missing_profile() {
        let mut book = ProfileBook::new();
        let mut j = Vec::new();
        assert_eq!(
            book.next_pub_id(&mut j, ProfileId(9)),
            Err(HubError::TokenDoesNotExist(ProfileId(9)))
        );
        assert!(j.is_empty());
    }

    #[test]
    fn test_zero_owner_rejected() {
        let mut book = ProfileBook::new();
        let mut j = Vec::new();
        assert!(book.create(&mut j, Address::ZERO, 1).is_err());
        assert!(book.is_empty());
    }
}
