//! # pubgraph
//!
//! A publication graph ledger: profiles, posts, comments, quotes and
//! mirrors linked into a reference graph, with pluggable collect and
//! reference modules.
//!
//! ## Overview
//!
//! - **Profiles** are numbered from 1 and owned by one address, which may
//!   approve delegated executors.
//! - **Publications** are keyed `(profileId, pubId)` with dense, 1-based ids
//!   per profile. Comments and quotes record the pointed publication and the
//!   root post of their thread; mirrors are pure pointers.
//! - **Referrers** are publications a request claims led to it. They are
//!   validated against the graph before any module sees them.
//! - **Modules** are whitelisted by governance and called with a legacy
//!   fallback for modules deployed before the modern interface.
//!
//! Every operation is all-or-nothing: a module veto or a storage failure
//! leaves the hub exactly as it was.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pubgraph::{Hub, HubConfig};
//! use pubgraph::core::{Address, PostParams};
//! use pubgraph::modules::{builtin::FreeCollectModule, ModuleRegistry};
//! use pubgraph::store::SqliteStore;
//!
//! async fn example() -> pubgraph::Result<()> {
//!     let free = Address::derive(b"free-collect");
//!     let mut registry = ModuleRegistry::new();
//!     registry.register_collect(free, Arc::new(FreeCollectModule));
//!
//!     let store = SqliteStore::open("hub.db")?;
//!     let hub = Hub::open(store, registry, HubConfig::default().collect_module(free)).await?;
//!
//!     let alice = Address::derive(b"alice");
//!     let profile = hub.create_profile(alice).await?;
//!     let pub_id = hub
//!         .post(PostParams::new(profile, "ipfs://hello", free), alice)
//!         .await?;
//!     assert_eq!(pub_id.0, 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `pubgraph::core` - identifiers, records, validation, events
//! - `pubgraph::access` - profiles, delegation, social graph, governance
//! - `pubgraph::modules` - module interfaces, dispatch and built-ins
//! - `pubgraph::store` - storage abstraction and SQLite

pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod journal;
pub mod state;

pub use pubgraph_access as access;
pub use pubgraph_core as core;
pub use pubgraph_modules as modules;
pub use pubgraph_store as store;

pub use config::HubConfig;
pub use engine::{Clock, Engine};
pub use error::{Error, Result};
pub use hub::Hub;
pub use journal::{Change, Checkpoint, Journal};
pub use state::{GraphState, Ledger};

pub use pubgraph_core::{
    Address, CollectParams, HubError, HubEvent, MirrorParams, PostParams, ProfileId, PubId,
    Publication, PublicationKey, PublicationType, ReferenceParams,
};
