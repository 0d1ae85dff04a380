//! # pubgraph core
//!
//! Pure primitives for the publication graph: identifiers, publication records,
//! request parameters, referrer validation and the chained event log.
//!
//! This crate contains no I/O and no storage. Everything here is deterministic
//! computation over plain data.
//!
//! ## Key Types
//!
//! - [`ProfileId`], [`PubId`], [`PublicationKey`] - compact numeric identifiers
//! - [`Publication`] and [`PublicationType`] - the stored record and its kind
//! - [`HubError`] - the protocol error taxonomy
//! - [`HubEvent`] / [`EventRecord`] - announcements, hash-chained
//!
//! ## Validation
//!
//! Graph rules live in [`validation`] and run against any [`PublicationView`].

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod params;
pub mod publication;
pub mod slot;
pub mod types;
pub mod validation;

pub use canonical::{from_cbor, to_canonical_cbor, to_cbor};
pub use crypto::Blake3Hash;
pub use error::{CoreError, HubError};
pub use event::{verify_chain, EventId, EventKind, EventRecord, HubEvent, ReferenceCreated};
pub use params::{
    CollectParams, CommentParams, MirrorParams, PostParams, QuoteParams, ReferenceKind,
    ReferenceParams,
};
pub use publication::{Publication, PublicationType};
pub use slot::{SlotKey, SlotWrite};
pub use types::{Address, ModuleFamily, ProfileId, ProfileRecord, PubId, PublicationKey};
pub use validation::{
    compute_root, thread_root, validate_pointed_pub, validate_referrer_and_get_referrer_pub_type,
    PublicationView, MAX_THREAD_DEPTH,
};

/// Get current time in milliseconds since Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
