//! Block status and follow relationships between profiles.

use std::collections::BTreeSet;

use pubgraph_core::ProfileId;

use crate::change::{AccessChange, AccessJournal};

/// Directed block and follow edges.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    /// `(by, blocked)`
    blocks: BTreeSet<(ProfileId, ProfileId)>,
    /// `(follower, followed)`
    follows: BTreeSet<(ProfileId, ProfileId)>,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `profile_id` is blocked by `by_profile_id`.
    pub fn is_blocked(&self, profile_id: ProfileId, by_profile_id: ProfileId) -> bool {
        self.blocks.contains(&(by_profile_id, profile_id))
    }

    pub fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.follows.contains(&(follower, followed))
    }

    /// Profiles following `profile_id`.
    pub fn followers_of(&self, profile_id: ProfileId) -> impl Iterator<Item = ProfileId> + '_ {
        self.follows
            .iter()
            .filter(move |(_, followed)| *followed == profile_id)
            .map(|(follower, _)| *follower)
    }

    pub(crate) fn set_block(
        &mut self,
        journal: &mut dyn AccessJournal,
        by_profile_id: ProfileId,
        profile_id: ProfileId,
        blocked: bool,
    ) {
        let edge = (by_profile_id, profile_id);
        let prev = if blocked {
            !self.blocks.insert(edge)
        } else {
            self.blocks.remove(&edge)
        };
        journal.record(AccessChange::Block {
            by_profile_id,
            profile_id,
            prev,
        });
    }

    pub(crate) fn set_follow(
        &mut self,
        journal: &mut dyn AccessJournal,
        follower: ProfileId,
        followed: ProfileId,
        following: bool,
    ) {
        let edge = (follower, followed);
        let prev = if following {
            !self.follows.insert(edge)
        } else {
            self.follows.remove(&edge)
        };
        journal.record(AccessChange::Follow {
            follower,
            followed,
            prev,
        });
    }

    pub(crate) fn blocks(&self) -> impl Iterator<Item = &(ProfileId, ProfileId)> {
        self.blocks.iter()
    }

    pub(crate) fn follows(&self) -> impl Iterator<Item = &(ProfileId, ProfileId)> {
        self.follows.iter()
    }

    pub(crate) fn restore_block(&mut self, by_profile_id: ProfileId, profile_id: ProfileId) {
        self.blocks.insert((by_profile_id, profile_id));
    }

    pub(crate) fn restore_follow(&mut self, follower: ProfileId, followed: ProfileId) {
        self.follows.insert((follower, followed));
    }

    pub(crate) fn undo(&mut self, change: &AccessChange) {
        match change {
            AccessChange::Block {
                by_profile_id,
                profile_id,
                prev,
            } => {
                let edge = (*by_profile_id, *profile_id);
                if *prev {
                    self.blocks.insert(edge);
                } else {
                    self.blocks.remove(&edge);
                }
            }
            AccessChange::Follow {
                follower,
                followed,
                prev,
            } => {
                let edge = (*follower, *followed);
                if *prev {
                    self.follows.insert(edge);
                } else {
                    self.follows.remove(&edge);
                }
            }
            _ => {}
        }
    }
}
