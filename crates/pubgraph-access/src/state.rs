//! The identity and capability resolver.
//!
//! [`AccessState`] bundles profiles, delegated executors, the social graph and
//! governance registries, and implements the collaborator operations on top
//! of them. Every mutation reports its undo record to an [`AccessJournal`] and
//! returns the events the caller should emit.

use pubgraph_core::{Address, HubError, HubEvent, ProfileId, ProfileRecord};
use tracing::debug;

use crate::change::{AccessChange, AccessJournal};
use crate::delegation::DelegationBook;
use crate::governance::{Governance, TreasuryData, WhitelistKind};
use crate::profile::ProfileBook;
use crate::social::SocialGraph;

#[derive(Debug, Clone, Default)]
pub struct AccessState {
    pub profiles: ProfileBook,
    pub delegation: DelegationBook,
    pub social: SocialGraph,
    pub governance: Governance,
}

impl AccessState {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn profile(&self, profile_id: ProfileId) -> Option<&ProfileRecord> {
        self.profiles.get(profile_id)
    }

    pub fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.profiles.owner_of(profile_id)
    }

    pub fn is_approved_executor(&self, profile_id: ProfileId, executor: Address) -> bool {
        self.delegation.is_approved(profile_id, executor)
    }

    /// Whether `profile_id` is blocked by `by_profile_id`.
    pub fn is_blocked(&self, profile_id: ProfileId, by_profile_id: ProfileId) -> bool {
        self.social.is_blocked(profile_id, by_profile_id)
    }

    pub fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.social.is_following(follower, followed)
    }

    pub fn is_collect_module_whitelisted(&self, module: Address) -> bool {
        self.governance
            .is_whitelisted(WhitelistKind::CollectModule, module)
    }

    pub fn is_reference_module_whitelisted(&self, module: Address) -> bool {
        self.governance
            .is_whitelisted(WhitelistKind::ReferenceModule, module)
    }

    pub fn is_currency_whitelisted(&self, currency: Address) -> bool {
        self.governance.is_whitelisted(WhitelistKind::Currency, currency)
    }

    pub fn treasury(&self) -> TreasuryData {
        self.governance.treasury()
    }

    /// Check that `executor` may act for `profile_id`; returns the owner.
    pub fn authorize(&self, profile_id: ProfileId, executor: Address) -> Result<Address, HubError> {
        let owner = self.profiles.require(profile_id)?.owner;
        if executor == owner || self.delegation.is_approved(profile_id, executor) {
            Ok(owner)
        } else {
            Err(HubError::ExecutorInvalid)
        }
    }

    fn require_owner(&self, profile_id: ProfileId, caller: Address) -> Result<(), HubError> {
        if self.profiles.require(profile_id)?.owner != caller {
            return Err(HubError::NotProfileOwner);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────────────

    pub fn create_profile(
        &mut self,
        journal: &mut dyn AccessJournal,
        to: Address,
        now: i64,
    ) -> Result<(ProfileId, Vec<HubEvent>), HubError> {
        let profile_id = self.profiles.create(journal, to, now)?;
        debug!(%profile_id, owner = %to, "profile created");
        Ok((
            profile_id,
            vec![HubEvent::ProfileCreated {
                profile_id,
                owner: to,
            }],
        ))
    }

    /// Transfer ownership. Existing delegations stop counting.
    pub fn transfer_profile(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
        from: Address,
        to: Address,
    ) -> Result<Vec<HubEvent>, HubError> {
        self.require_owner(profile_id, from)?;
        if to.is_zero() {
            return Err(HubError::InvalidParameter("transfer to the zero address"));
        }
        self.profiles.set_owner(journal, profile_id, to)?;
        let config_number = self.delegation.switch_to_fresh_config(journal, profile_id);
        Ok(vec![
            HubEvent::ProfileTransferred {
                profile_id,
                from,
                to,
            },
            HubEvent::DelegatedExecutorsConfigApplied {
                profile_id,
                config_number,
            },
        ])
    }

    pub fn change_delegated_executors_config(
        &mut self,
        journal: &mut dyn AccessJournal,
        caller: Address,
        profile_id: ProfileId,
        executors: &[Address],
        approvals: &[bool],
        config_number: u64,
        switch_to_given_config: bool,
    ) -> Result<Vec<HubEvent>, HubError> {
        self.require_owner(profile_id, caller)?;
        let update = self.delegation.change_config(
            journal,
            profile_id,
            executors,
            approvals,
            config_number,
            switch_to_given_config,
        )?;

        let mut events = vec![HubEvent::DelegatedExecutorsConfigChanged {
            profile_id,
            config_number: update.config_number,
            executors: executors.to_vec(),
            approvals: approvals.to_vec(),
        }];
        if update.switched {
            events.push(HubEvent::DelegatedExecutorsConfigApplied {
                profile_id,
                config_number: update.config_number,
            });
        }
        Ok(events)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Social graph
    // ─────────────────────────────────────────────────────────────────────

    /// Set block status of several profiles. Blocking drops the blocked
    /// profile's follow of the blocker.
    pub fn set_block_status(
        &mut self,
        journal: &mut dyn AccessJournal,
        executor: Address,
        by_profile_id: ProfileId,
        profile_ids: &[ProfileId],
        statuses: &[bool],
    ) -> Result<Vec<HubEvent>, HubError> {
        self.authorize(by_profile_id, executor)?;
        if profile_ids.len() != statuses.len() {
            return Err(HubError::InvalidParameter("profiles and statuses length mismatch"));
        }

        let mut events = Vec::new();
        for (&profile_id, &blocked) in profile_ids.iter().zip(statuses) {
            self.profiles.require(profile_id)?;
            if profile_id == by_profile_id {
                return Err(HubError::SelfBlock);
            }
            if blocked && self.social.is_following(profile_id, by_profile_id) {
                self.social
                    .set_follow(journal, profile_id, by_profile_id, false);
                events.push(HubEvent::Unfollowed {
                    follower: profile_id,
                    unfollowed: by_profile_id,
                });
            }
            self.social
                .set_block(journal, by_profile_id, profile_id, blocked);
            events.push(HubEvent::BlockStatusSet {
                by_profile_id,
                profile_id,
                blocked,
            });
        }
        Ok(events)
    }

    pub fn follow(
        &mut self,
        journal: &mut dyn AccessJournal,
        executor: Address,
        follower: ProfileId,
        targets: &[ProfileId],
    ) -> Result<Vec<HubEvent>, HubError> {
        self.authorize(follower, executor)?;

        let mut events = Vec::with_capacity(targets.len());
        for &followed in targets {
            self.profiles.require(followed)?;
            if followed == follower {
                return Err(HubError::SelfFollow);
            }
            if self.social.is_following(follower, followed) {
                return Err(HubError::AlreadyFollowing);
            }
            if self.social.is_blocked(follower, followed) {
                return Err(HubError::Blocked);
            }
            self.social.set_follow(journal, follower, followed, true);
            events.push(HubEvent::Followed { follower, followed });
        }
        Ok(events)
    }

    pub fn unfollow(
        &mut self,
        journal: &mut dyn AccessJournal,
        executor: Address,
        follower: ProfileId,
        targets: &[ProfileId],
    ) -> Result<Vec<HubEvent>, HubError> {
        self.authorize(follower, executor)?;

        let mut events = Vec::with_capacity(targets.len());
        for &unfollowed in targets {
            if !self.social.is_following(follower, unfollowed) {
                return Err(HubError::NotFollowing);
            }
            self.social.set_follow(journal, follower, unfollowed, false);
            events.push(HubEvent::Unfollowed {
                follower,
                unfollowed,
            });
        }
        Ok(events)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_whitelisted(
        &mut self,
        journal: &mut dyn AccessJournal,
        kind: WhitelistKind,
        address: Address,
        whitelisted: bool,
    ) -> Result<Vec<HubEvent>, HubError> {
        self.governance
            .set_whitelisted(journal, kind, address, whitelisted)?;
        let event = match kind {
            WhitelistKind::CollectModule => HubEvent::CollectModuleWhitelisted {
                module: address,
                whitelisted,
            },
            WhitelistKind::ReferenceModule => HubEvent::ReferenceModuleWhitelisted {
                module: address,
                whitelisted,
            },
            WhitelistKind::Currency => HubEvent::CurrencyWhitelisted {
                currency: address,
                whitelisted,
            },
        };
        Ok(vec![event])
    }

    pub fn set_treasury(
        &mut self,
        journal: &mut dyn AccessJournal,
        data: TreasuryData,
    ) -> Result<Vec<HubEvent>, HubError> {
        self.governance.set_treasury(journal, data)?;
        Ok(vec![HubEvent::TreasurySet {
            treasury: data.treasury,
            fee_bps: data.fee_bps,
        }])
    }

    // ─────────────────────────────────────────────────────────────────────
    // Journal
    // ─────────────────────────────────────────────────────────────────────

    /// Revert one change. Apply in reverse recording order.
    pub fn undo(&mut self, change: &AccessChange) {
        match change {
            AccessChange::ProfileCreated { .. }
            | AccessChange::PubCount { .. }
            | AccessChange::Owner { .. } => self.profiles.undo(change),
            AccessChange::DelegationConfig { .. } | AccessChange::Approval { .. } => {
                self.delegation.undo(change)
            }
            AccessChange::Block { .. } | AccessChange::Follow { .. } => self.social.undo(change),
            AccessChange::Whitelist { .. } | AccessChange::Treasury { .. } => {
                self.governance.undo(change)
            }
        }
    }
}
