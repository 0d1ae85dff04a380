//! Undo records for access state.
//!
//! Every mutation of [`AccessState`](crate::AccessState) reports the value it
//! overwrote as an [`AccessChange`]. Feeding the changes back to
//! [`AccessState::undo`](crate::AccessState::undo) in reverse order restores
//! the earlier state exactly.

use pubgraph_core::{Address, ProfileId};

use crate::delegation::DelegationConfig;
use crate::governance::{TreasuryData, WhitelistKind};

/// One overwritten value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessChange {
    ProfileCreated {
        profile_id: ProfileId,
    },
    PubCount {
        profile_id: ProfileId,
        prev: u64,
    },
    Owner {
        profile_id: ProfileId,
        prev: Address,
    },
    DelegationConfig {
        profile_id: ProfileId,
        prev: DelegationConfig,
    },
    Approval {
        profile_id: ProfileId,
        config_number: u64,
        executor: Address,
        prev: bool,
    },
    Block {
        by_profile_id: ProfileId,
        profile_id: ProfileId,
        prev: bool,
    },
    Follow {
        follower: ProfileId,
        followed: ProfileId,
        prev: bool,
    },
    Whitelist {
        kind: WhitelistKind,
        address: Address,
        prev: bool,
    },
    Treasury {
        prev: TreasuryData,
    },
}

impl AccessChange {
    /// The profile record this change touched, if it lives in the profile table.
    pub fn touched_profile(&self) -> Option<ProfileId> {
        match self {
            AccessChange::ProfileCreated { profile_id }
            | AccessChange::PubCount { profile_id, .. }
            | AccessChange::Owner { profile_id, .. } => Some(*profile_id),
            _ => None,
        }
    }
}

/// Sink for undo records.
pub trait AccessJournal {
    fn record(&mut self, change: AccessChange);
}

impl AccessJournal for Vec<AccessChange> {
    fn record(&mut self, change: AccessChange) {
        self.push(change);
    }
}
