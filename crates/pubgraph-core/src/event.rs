//! Hub events and the hash-chained event log.
//!
//! Every accepted operation appends one or more [`HubEvent`]s. Each stored
//! [`EventRecord`] commits to its predecessor:
//!
//! ```text
//! id = Blake3("pubgraph-event-v0" || prev || seq || timestamp || canonical_cbor(event))
//! ```
//!
//! so a replica can detect a truncated or edited log with [`verify_chain`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::to_canonical_cbor;
use crate::crypto::Blake3Hash;
use crate::error::CoreError;
use crate::publication::PublicationType;
use crate::types::{Address, ModuleFamily, ProfileId, PublicationKey};

const EVENT_DOMAIN: &[u8] = b"pubgraph-event-v0";

/// A 32-byte event identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub [u8; 32]);

impl EventId {
    /// The predecessor of the first event.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compute the id of an event given its position in the chain.
    pub fn compute(
        prev: &EventId,
        seq: u64,
        timestamp: i64,
        event: &HubEvent,
    ) -> Result<Self, CoreError> {
        let body = to_canonical_cbor(event)?;
        let hash = Blake3Hash::hash_parts(
            EVENT_DOMAIN,
            &[
                prev.as_bytes(),
                &seq.to_be_bytes(),
                &timestamp.to_be_bytes(),
                &body,
            ],
        );
        Ok(Self(hash.0))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Payload shared by `CommentCreated` and `QuoteCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCreated {
    pub publication: PublicationKey,
    pub content_uri: String,
    pub pointed: PublicationKey,
    pub root: PublicationKey,
    pub referrer: PublicationKey,
    pub referrer_pub_type: PublicationType,
    pub collect_module: Address,
    pub collect_module_return_data: Bytes,
    pub reference_module: Address,
    pub reference_module_return_data: Bytes,
    pub executor: Address,
}

/// Everything the hub announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    ProfileCreated {
        profile_id: ProfileId,
        owner: Address,
    },
    ProfileTransferred {
        profile_id: ProfileId,
        from: Address,
        to: Address,
    },
    PostCreated {
        publication: PublicationKey,
        content_uri: String,
        collect_module: Address,
        collect_module_return_data: Bytes,
        reference_module: Address,
        reference_module_return_data: Bytes,
        executor: Address,
    },
    CommentCreated(ReferenceCreated),
    QuoteCreated(ReferenceCreated),
    MirrorCreated {
        publication: PublicationKey,
        pointed: PublicationKey,
        referrer: PublicationKey,
        referrer_pub_type: PublicationType,
        executor: Address,
    },
    ModuleInitialized {
        publication: PublicationKey,
        family: ModuleFamily,
        module: Address,
        return_data: Bytes,
    },
    LegacyPublicationImported {
        publication: PublicationKey,
    },
    Collected {
        collector_profile_id: ProfileId,
        publication: PublicationKey,
        referrer: PublicationKey,
        referrer_pub_type: PublicationType,
        collect_nonce: u64,
        executor: Address,
        return_data: Bytes,
    },
    Followed {
        follower: ProfileId,
        followed: ProfileId,
    },
    Unfollowed {
        follower: ProfileId,
        unfollowed: ProfileId,
    },
    BlockStatusSet {
        by_profile_id: ProfileId,
        profile_id: ProfileId,
        blocked: bool,
    },
    DelegatedExecutorsConfigChanged {
        profile_id: ProfileId,
        config_number: u64,
        executors: Vec<Address>,
        approvals: Vec<bool>,
    },
    DelegatedExecutorsConfigApplied {
        profile_id: ProfileId,
        config_number: u64,
    },
    CollectModuleWhitelisted {
        module: Address,
        whitelisted: bool,
    },
    ReferenceModuleWhitelisted {
        module: Address,
        whitelisted: bool,
    },
    CurrencyWhitelisted {
        currency: Address,
        whitelisted: bool,
    },
    TreasurySet {
        treasury: Address,
        fee_bps: u16,
    },
    Deposited {
        currency: Address,
        holder: Address,
        amount: u128,
    },
}

/// Discriminant of a [`HubEvent`], stored alongside each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    ProfileCreated = 1,
    ProfileTransferred = 2,
    PostCreated = 10,
    CommentCreated = 11,
    QuoteCreated = 12,
    MirrorCreated = 13,
    ModuleInitialized = 14,
    LegacyPublicationImported = 15,
    Collected = 20,
    Followed = 30,
    Unfollowed = 31,
    BlockStatusSet = 32,
    DelegatedExecutorsConfigChanged = 40,
    DelegatedExecutorsConfigApplied = 41,
    CollectModuleWhitelisted = 50,
    ReferenceModuleWhitelisted = 51,
    CurrencyWhitelisted = 52,
    TreasurySet = 53,
    Deposited = 60,
}

impl EventKind {
    /// Convert to u16 for storage.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::ProfileCreated,
            2 => Self::ProfileTransferred,
            10 => Self::PostCreated,
            11 => Self::CommentCreated,
            12 => Self::QuoteCreated,
            13 => Self::MirrorCreated,
            14 => Self::ModuleInitialized,
            15 => Self::LegacyPublicationImported,
            20 => Self::Collected,
            30 => Self::Followed,
            31 => Self::Unfollowed,
            32 => Self::BlockStatusSet,
            40 => Self::DelegatedExecutorsConfigChanged,
            41 => Self::DelegatedExecutorsConfigApplied,
            50 => Self::CollectModuleWhitelisted,
            51 => Self::ReferenceModuleWhitelisted,
            52 => Self::CurrencyWhitelisted,
            53 => Self::TreasurySet,
            60 => Self::Deposited,
            _ => return None,
        })
    }
}

impl HubEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HubEvent::ProfileCreated { .. } => EventKind::ProfileCreated,
            HubEvent::ProfileTransferred { .. } => EventKind::ProfileTransferred,
            HubEvent::PostCreated { .. } => EventKind::PostCreated,
            HubEvent::CommentCreated(_) => EventKind::CommentCreated,
            HubEvent::QuoteCreated(_) => EventKind::QuoteCreated,
            HubEvent::MirrorCreated { .. } => EventKind::MirrorCreated,
            HubEvent::ModuleInitialized { .. } => EventKind::ModuleInitialized,
            HubEvent::LegacyPublicationImported { .. } => EventKind::LegacyPublicationImported,
            HubEvent::Collected { .. } => EventKind::Collected,
            HubEvent::Followed { .. } => EventKind::Followed,
            HubEvent::Unfollowed { .. } => EventKind::Unfollowed,
            HubEvent::BlockStatusSet { .. } => EventKind::BlockStatusSet,
            HubEvent::DelegatedExecutorsConfigChanged { .. } => {
                EventKind::DelegatedExecutorsConfigChanged
            }
            HubEvent::DelegatedExecutorsConfigApplied { .. } => {
                EventKind::DelegatedExecutorsConfigApplied
            }
            HubEvent::CollectModuleWhitelisted { .. } => EventKind::CollectModuleWhitelisted,
            HubEvent::ReferenceModuleWhitelisted { .. } => EventKind::ReferenceModuleWhitelisted,
            HubEvent::CurrencyWhitelisted { .. } => EventKind::CurrencyWhitelisted,
            HubEvent::TreasurySet { .. } => EventKind::TreasurySet,
            HubEvent::Deposited { .. } => EventKind::Deposited,
        }
    }

    /// The publication this event is about, if any.
    pub fn publication(&self) -> Option<PublicationKey> {
        match self {
            HubEvent::PostCreated { publication, .. }
            | HubEvent::MirrorCreated { publication, .. }
            | HubEvent::ModuleInitialized { publication, .. }
            | HubEvent::LegacyPublicationImported { publication }
            | HubEvent::Collected { publication, .. } => Some(*publication),
            HubEvent::CommentCreated(r) | HubEvent::QuoteCreated(r) => Some(r.publication),
            _ => None,
        }
    }
}

/// A stored, chained event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub id: EventId,
    pub prev: EventId,
    /// Unix ms at which the operation was accepted.
    pub timestamp: i64,
    pub event: HubEvent,
}

impl EventRecord {
    /// Chain `event` after `prev` at position `seq`.
    pub fn chain(
        prev: EventId,
        seq: u64,
        timestamp: i64,
        event: HubEvent,
    ) -> Result<Self, CoreError> {
        let id = EventId::compute(&prev, seq, timestamp, &event)?;
        Ok(Self {
            seq,
            id,
            prev,
            timestamp,
            event,
        })
    }

    /// Recompute this record's id and compare.
    pub fn verify_id(&self) -> Result<bool, CoreError> {
        Ok(EventId::compute(&self.prev, self.seq, self.timestamp, &self.event)? == self.id)
    }
}

/// Check that `records` form an unbroken chain starting after `(seq0, prev0)`.
pub fn verify_chain<'a, I>(start_seq: u64, start_prev: EventId, records: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut expected_seq = start_seq + 1;
    let mut expected_prev = start_prev;
    for record in records {
        if record.seq != expected_seq || record.prev != expected_prev || !record.verify_id()? {
            return Err(CoreError::ChainBroken { seq: record.seq });
        }
        expected_seq += 1;
        expected_prev = record.id;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chain() -> Vec<EventRecord> {
        let events = [
            HubEvent::ProfileCreated {
                profile_id: ProfileId(1),
                owner: Address::derive(b"alice"),
            },
            HubEvent::PostCreated {
                publication: PublicationKey::from((1, 1)),
                content_uri: "ipfs://post".into(),
                collect_module: Address::derive(b"free"),
                collect_module_return_data: Bytes::new(),
                reference_module: Address::ZERO,
                reference_module_return_data: Bytes::new(),
                executor: Address::derive(b"alice"),
            },
            HubEvent::Followed {
                follower: ProfileId(2),
                followed: ProfileId(1),
            },
        ];
        let mut out = Vec::new();
        let mut prev = EventId::ZERO;
        for (i, e) in events.into_iter().enumerate() {
            let r = EventRecord::chain(prev, i as u64 + 1, 1_700_000_000_000, e).unwrap();
            prev = r.id;
            out.push(r);
        }
        out
    }

    #[test]
    fn test_chain_verifies() {
        let chain = sample_chain();
        assert!(verify_chain(0, EventId::ZERO, &chain).is_ok());
        assert!(verify_chain(1, chain[0].id, &chain[1..]).is_ok());
    }

    #[test]
    fn test_tampered_event_detected() {
        let mut chain = sample_chain();
        if let HubEvent::Followed { follower, .. } = &mut chain[2].event {
            *follower = ProfileId(3);
        }
        assert!(matches!(
            verify_chain(0, EventId::ZERO, &chain),
            Err(CoreError::ChainBroken { seq: 3 })
        ));
    }

    #[test]
    fn test_gap_detected() {
        let chain = sample_chain();
        let gapped = [chain[0].clone(), chain[2].clone()];
        assert!(verify_chain(0, EventId::ZERO, &gapped).is_err());
    }

    #[test]
    fn test_kind_roundtrip() {
        for record in sample_chain() {
            let kind = record.event.kind();
            assert_eq!(EventKind::from_u16(kind.to_u16()), Some(kind));
        }
        assert_eq!(EventKind::from_u16(999), None);
    }

    #[test]
    fn test_publication_accessor() {
        let chain = sample_chain();
        assert_eq!(chain[0].event.publication(), None);
        assert_eq!(chain[1].event.publication(), Some(PublicationKey::from((1, 1))));
    }
}
