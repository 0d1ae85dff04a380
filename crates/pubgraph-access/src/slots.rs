//! Slot encoding of access state.
//!
//! Profiles persist as records of their own; everything else maps to one
//! slot per entry. Set membership is stored as CBOR `true`, absence deletes
//! the slot.

use pubgraph_core::{from_cbor, to_cbor, Address, CoreError, ProfileId, SlotKey};

use crate::change::AccessChange;
use crate::delegation::DelegationConfig;
use crate::governance::{TreasuryData, WhitelistKind};
use crate::state::AccessState;

pub const NS_DELEGATION_CONFIG: &str = "access.delegation.config";
pub const NS_APPROVAL: &str = "access.delegation.approval";
pub const NS_BLOCK: &str = "access.block";
pub const NS_FOLLOW: &str = "access.follow";
pub const NS_WHITELIST_COLLECT: &str = "access.whitelist.collect";
pub const NS_WHITELIST_REFERENCE: &str = "access.whitelist.reference";
pub const NS_WHITELIST_CURRENCY: &str = "access.whitelist.currency";
pub const NS_TREASURY: &str = "access.treasury";

/// Whether a namespace belongs to access state.
pub fn is_access_namespace(namespace: &str) -> bool {
    namespace.starts_with("access.")
}

fn whitelist_namespace(kind: WhitelistKind) -> &'static str {
    match kind {
        WhitelistKind::CollectModule => NS_WHITELIST_COLLECT,
        WhitelistKind::ReferenceModule => NS_WHITELIST_REFERENCE,
        WhitelistKind::Currency => NS_WHITELIST_CURRENCY,
    }
}

fn present(flag: bool) -> Result<Option<Vec<u8>>, CoreError> {
    if flag {
        Ok(Some(to_cbor(&true)?))
    } else {
        Ok(None)
    }
}

impl AccessChange {
    /// The slot this change touched. `None` for profile-table changes.
    pub fn slot(&self) -> Result<Option<SlotKey>, CoreError> {
        let slot = match self {
            AccessChange::ProfileCreated { .. }
            | AccessChange::PubCount { .. }
            | AccessChange::Owner { .. } => return Ok(None),
            AccessChange::DelegationConfig { profile_id, .. } => {
                SlotKey::encode(NS_DELEGATION_CONFIG, profile_id)?
            }
            AccessChange::Approval {
                profile_id,
                config_number,
                executor,
                ..
            } => SlotKey::encode(NS_APPROVAL, &(profile_id, config_number, executor))?,
            AccessChange::Block {
                by_profile_id,
                profile_id,
                ..
            } => SlotKey::encode(NS_BLOCK, &(by_profile_id, profile_id))?,
            AccessChange::Follow {
                follower, followed, ..
            } => SlotKey::encode(NS_FOLLOW, &(follower, followed))?,
            AccessChange::Whitelist { kind, address, .. } => {
                SlotKey::encode(whitelist_namespace(*kind), address)?
            }
            AccessChange::Treasury { .. } => SlotKey::new(NS_TREASURY, Vec::new()),
        };
        Ok(Some(slot))
    }
}

impl AccessState {
    /// Current value of an access slot.
    pub fn slot_value(&self, slot: &SlotKey) -> Result<Option<Vec<u8>>, CoreError> {
        match slot.namespace.as_str() {
            NS_DELEGATION_CONFIG => {
                let profile_id: ProfileId = from_cbor(&slot.key)?;
                let config = self.delegation.config(profile_id);
                if config == DelegationConfig::default() {
                    Ok(None)
                } else {
                    Ok(Some(to_cbor(&config)?))
                }
            }
            NS_APPROVAL => {
                let (profile_id, config_number, executor): (ProfileId, u64, Address) =
                    from_cbor(&slot.key)?;
                present(
                    self.delegation
                        .is_approved_under(profile_id, config_number, executor),
                )
            }
            NS_BLOCK => {
                let (by, blocked): (ProfileId, ProfileId) = from_cbor(&slot.key)?;
                present(self.social.is_blocked(blocked, by))
            }
            NS_FOLLOW => {
                let (follower, followed): (ProfileId, ProfileId) = from_cbor(&slot.key)?;
                present(self.social.is_following(follower, followed))
            }
            NS_WHITELIST_COLLECT => self.whitelist_slot(WhitelistKind::CollectModule, slot),
            NS_WHITELIST_REFERENCE => self.whitelist_slot(WhitelistKind::ReferenceModule, slot),
            NS_WHITELIST_CURRENCY => self.whitelist_slot(WhitelistKind::Currency, slot),
            NS_TREASURY => Ok(Some(to_cbor(&self.governance.treasury())?)),
            other => Err(CoreError::DecodingError(format!(
                "not an access namespace: {other}"
            ))),
        }
    }

    fn whitelist_slot(&self, kind: WhitelistKind, slot: &SlotKey) -> Result<Option<Vec<u8>>, CoreError> {
        let address: Address = from_cbor(&slot.key)?;
        present(self.governance.is_whitelisted(kind, address))
    }

    /// Load a persisted slot without journaling.
    pub fn restore_slot(&mut self, slot: &SlotKey, value: &[u8]) -> Result<(), CoreError> {
        match slot.namespace.as_str() {
            NS_DELEGATION_CONFIG => {
                let profile_id: ProfileId = from_cbor(&slot.key)?;
                let config: DelegationConfig = from_cbor(value)?;
                self.delegation.restore_config(profile_id, config);
            }
            NS_APPROVAL => {
                let (profile_id, config_number, executor): (ProfileId, u64, Address) =
                    from_cbor(&slot.key)?;
                self.delegation
                    .restore_approval(profile_id, config_number, executor);
            }
            NS_BLOCK => {
                let (by, blocked): (ProfileId, ProfileId) = from_cbor(&slot.key)?;
                self.social.restore_block(by, blocked);
            }
            NS_FOLLOW => {
                let (follower, followed): (ProfileId, ProfileId) = from_cbor(&slot.key)?;
                self.social.restore_follow(follower, followed);
            }
            NS_WHITELIST_COLLECT => self
                .governance
                .restore_whitelisted(WhitelistKind::CollectModule, from_cbor(&slot.key)?),
            NS_WHITELIST_REFERENCE => self
                .governance
                .restore_whitelisted(WhitelistKind::ReferenceModule, from_cbor(&slot.key)?),
            NS_WHITELIST_CURRENCY => self
                .governance
                .restore_whitelisted(WhitelistKind::Currency, from_cbor(&slot.key)?),
            NS_TREASURY => {
                let data: TreasuryData = from_cbor(value)?;
                self.governance.restore_treasury(data);
            }
            other => {
                return Err(CoreError::DecodingError(format!(
                    "not an access namespace: {other}"
                )))
            }
        }
        Ok(())
    }

    /// Every non-empty access slot, for full exports.
    pub fn slots(&self) -> Result<Vec<(SlotKey, Vec<u8>)>, CoreError> {
        let mut out = Vec::new();
        for (profile_id, config) in self.delegation.configs() {
            out.push((
                SlotKey::encode(NS_DELEGATION_CONFIG, profile_id)?,
                to_cbor(config)?,
            ));
        }
        for (profile_id, config_number, executor) in self.delegation.approved() {
            out.push((
                SlotKey::encode(NS_APPROVAL, &(profile_id, config_number, executor))?,
                to_cbor(&true)?,
            ));
        }
        for edge in self.social.blocks() {
            out.push((SlotKey::encode(NS_BLOCK, edge)?, to_cbor(&true)?));
        }
        for edge in self.social.follows() {
            out.push((SlotKey::encode(NS_FOLLOW, edge)?, to_cbor(&true)?));
        }
        for kind in [
            WhitelistKind::CollectModule,
            WhitelistKind::ReferenceModule,
            WhitelistKind::Currency,
        ] {
            for address in self.governance.whitelisted(kind) {
                out.push((
                    SlotKey::encode(whitelist_namespace(kind), address)?,
                    to_cbor(&true)?,
                ));
            }
        }
        out.push((
            SlotKey::new(NS_TREASURY, Vec::new()),
            to_cbor(&self.governance.treasury())?,
        ));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::AccessChange;

    #[test]
    fn test_exported_slots_restore_identically() {
        let mut state = AccessState::new();
        let mut j: Vec<AccessChange> = Vec::new();
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        let (a, _) = state.create_profile(&mut j, alice, 1).unwrap();
        let (b, _) = state.create_profile(&mut j, bob, 1).unwrap();
        state.follow(&mut j, bob, b, &[a]).unwrap();
        state
            .change_delegated_executors_config(&mut j, alice, a, &[bob], &[true], 1, true)
            .unwrap();
        state
            .set_whitelisted(&mut j, WhitelistKind::CollectModule, alice, true)
            .unwrap();

        let mut restored = AccessState::new();
        for record in state.profiles.iter() {
            restored.profiles.restore(record.clone());
        }
        for (slot, value) in state.slots().unwrap() {
            restored.restore_slot(&slot, &value).unwrap();
        }

        assert!(restored.is_following(b, a));
        assert!(restored.is_approved_executor(a, bob));
        assert_eq!(restored.delegation.config(a), state.delegation.config(a));
        assert!(restored.is_collect_module_whitelisted(alice));
    }

    #[test]
    fn test_change_slot_reflects_current_value() {
        let mut state = AccessState::new();
        let mut j: Vec<AccessChange> = Vec::new();
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        let (a, _) = state.create_profile(&mut j, alice, 1).unwrap();
        let (b, _) = state.create_profile(&mut j, bob, 1).unwrap();
        j.clear();

        state.follow(&mut j, bob, b, &[a]).unwrap();
        let slot = j[0].slot().unwrap().unwrap();
        assert_eq!(slot.namespace, NS_FOLLOW);
        assert!(state.slot_value(&slot).unwrap().is_some());

        state.unfollow(&mut j, bob, b, &[a]).unwrap();
        assert!(state.slot_value(&slot).unwrap().is_none());
    }

    #[test]
    fn test_profile_changes_have_no_slot() {
        let change = AccessChange::PubCount {
            profile_id: ProfileId(1),
            prev: 0,
        };
        assert!(change.slot().unwrap().is_none());
        assert_eq!(change.touched_profile(), Some(ProfileId(1)));
    }
}
