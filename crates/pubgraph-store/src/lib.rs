//! # pubgraph store
//!
//! Storage abstraction and SQLite implementation for the publication graph.
//!
//! ## Key Types
//!
//! - [`Store`] - the async storage trait
//! - [`WriteBatch`] - the writes of one accepted operation, applied atomically
//! - [`Snapshot`] - full committed state, loaded when a hub opens
//! - [`SqliteStore`] - durable backend
//! - [`MemoryStore`] - in-memory backend for tests
//!
//! ## Tables
//!
//! | table | holds |
//! |---|---|
//! | `profiles` | one row per profile |
//! | `publications` | one row per publication, keyed `(profile_id, pub_id)` |
//! | `state_slots` | every other piece of state, by namespace |
//! | `events` | the hash-chained event log |

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Snapshot, Store, WriteBatch};
