//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use pubgraph_core::{
    EventId, EventRecord, ProfileId, ProfileRecord, PubId, Publication, PublicationKey, SlotKey,
};

use crate::error::{Result, StoreError};
use crate::traits::{Snapshot, Store, WriteBatch};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    profiles: BTreeMap<ProfileId, ProfileRecord>,
    publications: BTreeMap<PublicationKey, Publication>,
    slots: BTreeMap<SlotKey, Vec<u8>>,
    events: BTreeMap<u64, EventRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        let mut inner = self.write()?;

        // Check before mutating so a conflict leaves nothing behind.
        for record in &batch.events {
            if inner.events.contains_key(&record.seq) {
                return Err(StoreError::Conflict { seq: record.seq });
            }
        }

        for profile in &batch.profiles {
            inner.profiles.insert(profile.profile_id, profile.clone());
        }
        for (key, publication) in &batch.publications {
            inner.publications.insert(*key, publication.clone());
        }
        for write in &batch.slots {
            match &write.value {
                Some(value) => {
                    inner.slots.insert(write.slot.clone(), value.clone());
                }
                None => {
                    inner.slots.remove(&write.slot);
                }
            }
        }
        for record in &batch.events {
            inner.events.insert(record.seq, record.clone());
        }
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Snapshot> {
        let inner = self.read()?;
        Ok(Snapshot {
            profiles: inner.profiles.values().cloned().collect(),
            publications: inner
                .publications
                .iter()
                .map(|(k, p)| (*k, p.clone()))
                .collect(),
            slots: inner
                .slots
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            event_head: inner
                .events
                .values()
                .next_back()
                .map(|r| (r.seq, r.id)),
        })
    }

    async fn get_profile(&self, profile_id: ProfileId) -> Result<Option<ProfileRecord>> {
        Ok(self.read()?.profiles.get(&profile_id).cloned())
    }

    async fn get_publication(&self, key: &PublicationKey) -> Result<Option<Publication>> {
        Ok(self.read()?.publications.get(key).cloned())
    }

    async fn get_publications_range(
        &self,
        profile_id: ProfileId,
        start: PubId,
        end: PubId,
    ) -> Result<Vec<(PublicationKey, Publication)>> {
        if start > end {
            return Ok(Vec::new());
        }
        let inner = self.read()?;
        let range = PublicationKey::new(profile_id, start)..=PublicationKey::new(profile_id, end);
        Ok(inner
            .publications
            .range(range)
            .map(|(k, p)| (*k, p.clone()))
            .collect())
    }

    async fn get_slot(&self, slot: &SlotKey) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.slots.get(slot).cloned())
    }

    async fn get_events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let inner = self.read()?;
        Ok(inner
            .events
            .range(after_seq.saturating_add(1)..)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn event_head(&self) -> Result<Option<(u64, EventId)>> {
        Ok(self
            .read()?
            .events
            .values()
            .next_back()
            .map(|r| (r.seq, r.id)))
    }
}
