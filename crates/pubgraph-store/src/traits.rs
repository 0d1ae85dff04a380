//! Store trait definition.
//!
//! The store persists the committed state of a hub: profile records,
//! publication records, namespaced slots and the chained event log.
//! Writes arrive as a [`WriteBatch`], one per accepted operation, and
//! must be applied all-or-nothing.

use async_trait::async_trait;

use pubgraph_core::{
    EventId, EventRecord, ProfileId, ProfileRecord, PubId, Publication, PublicationKey, SlotKey,
    SlotWrite,
};

use crate::error::Result;

/// Everything one accepted operation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// Profile records to upsert.
    pub profiles: Vec<ProfileRecord>,
    /// Publication records to upsert.
    pub publications: Vec<(PublicationKey, Publication)>,
    /// Slot writes; `None` values delete.
    pub slots: Vec<SlotWrite>,
    /// Events to append, in sequence order.
    pub events: Vec<EventRecord>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
            && self.publications.is_empty()
            && self.slots.is_empty()
            && self.events.is_empty()
    }
}

/// The full committed state, as loaded on startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub profiles: Vec<ProfileRecord>,
    pub publications: Vec<(PublicationKey, Publication)>,
    pub slots: Vec<(SlotKey, Vec<u8>)>,
    /// Last event `(seq, id)`, or `None` for an empty log.
    pub event_head: Option<(u64, EventId)>,
}

/// The storage trait.
///
/// All implementations must be thread-safe and apply each batch
/// atomically: after a failed `apply_batch`, nothing from it is visible.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a batch atomically.
    ///
    /// Fails with `Conflict` if any event's `seq` is already stored.
    async fn apply_batch(&self, batch: &WriteBatch) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────────

    /// Load every profile, publication and slot.
    async fn load_snapshot(&self) -> Result<Snapshot>;

    async fn get_profile(&self, profile_id: ProfileId) -> Result<Option<ProfileRecord>>;

    async fn get_publication(&self, key: &PublicationKey) -> Result<Option<Publication>>;

    /// Publications of `profile_id` with `start <= pub_id <= end`, in order.
    async fn get_publications_range(
        &self,
        profile_id: ProfileId,
        start: PubId,
        end: PubId,
    ) -> Result<Vec<(PublicationKey, Publication)>>;

    async fn get_slot(&self, slot: &SlotKey) -> Result<Option<Vec<u8>>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Event log
    // ─────────────────────────────────────────────────────────────────────────

    /// Events with `seq > after_seq`, ascending, at most `limit`.
    async fn get_events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>>;

    /// The last stored event `(seq, id)`.
    async fn event_head(&self) -> Result<Option<(u64, EventId)>>;
}
