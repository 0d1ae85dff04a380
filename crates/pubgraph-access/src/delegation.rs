//! Delegated executors under versioned approval configurations.
//!
//! Each profile owns a sequence of numbered configurations. Approvals are
//! recorded per `(config_number, executor)`; only the approvals of the
//! current configuration count. Switching to a fresh configuration (as on
//! transfer) revokes every delegation at once without touching old entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pubgraph_core::{Address, HubError, ProfileId};

use crate::change::{AccessChange, AccessJournal};

/// Configuration numbers of one profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// The configuration whose approvals are in force.
    pub config_number: u64,
    /// The configuration in force before the last switch.
    pub prev_config_number: u64,
    /// Highest configuration number ever prepared.
    pub max_config_number: u64,
}

/// Outcome of a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// The configuration the approvals were written under.
    pub config_number: u64,
    /// Whether the profile switched to it.
    pub switched: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DelegationBook {
    configs: BTreeMap<ProfileId, DelegationConfig>,
    approvals: BTreeMap<(ProfileId, u64, Address), bool>,
}

impl DelegationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self, profile_id: ProfileId) -> DelegationConfig {
        self.configs.get(&profile_id).copied().unwrap_or_default()
    }

    /// Whether `executor` is approved under the current configuration.
    pub fn is_approved(&self, profile_id: ProfileId, executor: Address) -> bool {
        let current = self.config(profile_id).config_number;
        self.is_approved_under(profile_id, current, executor)
    }

    pub fn is_approved_under(&self, profile_id: ProfileId, config_number: u64, executor: Address) -> bool {
        self.approvals
            .get(&(profile_id, config_number, executor))
            .copied()
            .unwrap_or(false)
    }

    /// Write approvals under `config_number` (0 = current), optionally switching to it.
    ///
    /// A config number above the highest one prepared must be exactly the next
    /// one.
    pub fn change_config(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
        executors: &[Address],
        approvals: &[bool],
        config_number: u64,
        switch_to_given_config: bool,
    ) -> Result<ConfigUpdate, HubError> {
        if executors.len() != approvals.len() {
            return Err(HubError::InvalidParameter("executors and approvals length mismatch"));
        }

        let mut config = self.config(profile_id);
        let target = if config_number == 0 {
            config.config_number
        } else {
            config_number
        };

        let next_available = config.max_config_number + 1;
        if target > next_available {
            return Err(HubError::InvalidParameter("config number skips ahead"));
        }
        if target == next_available {
            config.max_config_number = next_available;
        }

        let switched = switch_to_given_config && target != config.config_number;
        if switched {
            config.prev_config_number = config.config_number;
            config.config_number = target;
        }
        self.set_config(journal, profile_id, config);

        for (executor, approved) in executors.iter().zip(approvals) {
            self.set_approval(journal, profile_id, target, *executor, *approved);
        }

        Ok(ConfigUpdate {
            config_number: target,
            switched,
        })
    }

    /// Move to a never-used configuration, dropping every current delegation.
    pub fn switch_to_fresh_config(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
    ) -> u64 {
        let mut config = self.config(profile_id);
        let fresh = config.max_config_number + 1;
        config.prev_config_number = config.config_number;
        config.config_number = fresh;
        config.max_config_number = fresh;
        self.set_config(journal, profile_id, config);
        fresh
    }

    fn set_config(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
        config: DelegationConfig,
    ) {
        let prev = self.configs.insert(profile_id, config).unwrap_or_default();
        if prev != config {
            journal.record(AccessChange::DelegationConfig { profile_id, prev });
        }
    }

    fn set_approval(
        &mut self,
        journal: &mut dyn AccessJournal,
        profile_id: ProfileId,
        config_number: u64,
        executor: Address,
        approved: bool,
    ) {
        let key = (profile_id, config_number, executor);
        let prev = if approved {
            self.approvals.insert(key, true).unwrap_or(false)
        } else {
            self.approvals.remove(&key).unwrap_or(false)
        };
        journal.record(AccessChange::Approval {
            profile_id,
            config_number,
            executor,
            prev,
        });
    }

    pub(crate) fn restore_config(&mut self, profile_id: ProfileId, config: DelegationConfig) {
        self.configs.insert(profile_id, config);
    }

    pub(crate) fn restore_approval(&mut self, profile_id: ProfileId, config_number: u64, executor: Address) {
        self.approvals.insert((profile_id, config_number, executor), true);
    }

    pub(crate) fn approved(&self) -> impl Iterator<Item = (ProfileId, u64, Address)> + '_ {
        self.approvals
            .iter()
            .filter(|(_, approved)| **approved)
            .map(|(key, _)| *key)
    }

    pub(crate) fn configs(&self) -> impl Iterator<Item = (&ProfileId, &DelegationConfig)> {
        self.configs.iter()
    }

    pub(crate) fn undo(&mut self, change: &AccessChange) {
        match change {
            AccessChange::DelegationConfig { profile_id, prev } => {
                if *prev == DelegationConfig::default() {
                    self.configs.remove(profile_id);
                } else {
                    self.configs.insert(*profile_id, *prev);
                }
            }
            AccessChange::Approval {
                profile_id,
                config_number,
                executor,
                prev,
            } => {
                let key = (*profile_id, *config_number, *executor);
                if *prev {
                    self.approvals.insert(key, true);
                } else {
                    self.approvals.remove(&key);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: ProfileId = ProfileId(1);

    fn exec() -> Address {
        Address::derive(b"executor")
    }

    #[test]
    fn test_approve_under_current_config() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        let update = book
            .change_config(&mut j, P, &[exec()], &[true], 0, false)
            .unwrap();
        assert_eq!(update, ConfigUpdate { config_number: 0, switched: false });
        assert!(book.is_approved(P, exec()));
    }

    #[test]
    fn test_next_config_must_be_sequential() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        assert_eq!(
            book.change_config(&mut j, P, &[exec()], &[true], 2, false),
            Err(HubError::InvalidParameter("config number skips ahead"))
        );
        let update = book
            .change_config(&mut j, P, &[exec()], &[true], 1, false)
            .unwrap();
        assert!(!update.switched);
        // Prepared, not applied.
        assert!(!book.is_approved(P, exec()));
        assert_eq!(book.config(P).max_config_number, 1);
    }

    #[test]
    fn test_switch_applies_prepared_config() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        book.change_config(&mut j, P, &[exec()], &[true], 1, true)
            .unwrap();
        let config = book.config(P);
        assert_eq!(config.config_number, 1);
        assert_eq!(config.prev_config_number, 0);
        assert!(book.is_approved(P, exec()));
    }

    #[test]
    fn test_fresh_config_revokes_everything() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        book.change_config(&mut j, P, &[exec()], &[true], 0, false)
            .unwrap();
        let fresh = book.switch_to_fresh_config(&mut j, P);
        assert_eq!(fresh, 1);
        assert!(!book.is_approved(P, exec()));
        assert!(book.is_approved_under(P, 0, exec()));
    }

    #[test]
    fn test_length_mismatch() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        assert!(matches!(
            book.change_config(&mut j, P, &[exec()], &[], 0, false),
            Err(HubError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_undo_restores() {
        let mut book = DelegationBook::new();
        let mut j = Vec::new();
        book.change_config(&mut j, P, &[exec()], &[true], 1, true)
            .unwrap();
        for change in j.iter().rev() {
            book.undo(change);
        }
        assert_eq!(book.config(P), DelegationConfig::default());
        assert!(!book.is_approved_under(P, 1, exec()));
    }
}
