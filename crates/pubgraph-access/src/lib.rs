//! # pubgraph access
//!
//! Identity and capability resolution for the publication graph.
//!
//! This crate answers "who may act for a profile" and holds the simple
//! relational state the publishing engine consults:
//!
//! - [`ProfileBook`] - profile ownership and publication counters
//! - [`DelegationBook`] - delegated executors under versioned configurations
//! - [`SocialGraph`] - blocks and follows
//! - [`Governance`] - module and currency whitelists, treasury data
//!
//! [`AccessState`] ties them together. All mutations are journaled through
//! [`AccessChange`] so a failed operation can be rolled back exactly.

pub mod change;
pub mod delegation;
pub mod governance;
pub mod profile;
pub mod slots;
pub mod social;
pub mod state;

pub use change::{AccessChange, AccessJournal};
pub use delegation::{ConfigUpdate, DelegationBook, DelegationConfig};
pub use governance::{Governance, TreasuryData, WhitelistKind, BPS_MAX};
pub use profile::ProfileBook;
pub use slots::is_access_namespace;
pub use social::SocialGraph;
pub use state::AccessState;
