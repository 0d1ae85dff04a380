//! In-memory graph and environment for module unit tests.

use std::collections::{BTreeMap, BTreeSet};

use pubgraph_access::TreasuryData;
use pubgraph_core::{Address, HubError, ProfileId, Publication, PublicationKey, PublicationView};

use crate::context::{GraphView, ModuleEnv};

#[derive(Default)]
pub struct MockGraph {
    pub publications: BTreeMap<PublicationKey, Publication>,
    pub owners: BTreeMap<ProfileId, Address>,
    pub follows: BTreeSet<(ProfileId, ProfileId)>,
    pub currencies: BTreeSet<Address>,
    pub treasury: TreasuryData,
}

impl PublicationView for MockGraph {
    fn publication(&self, key: PublicationKey) -> Option<&Publication> {
        self.publications.get(&key)
    }

    fn profile_exists(&self, profile_id: ProfileId) -> bool {
        self.owners.contains_key(&profile_id)
    }
}

impl GraphView for MockGraph {
    fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.owners.get(&profile_id).copied()
    }

    fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.follows.contains(&(follower, followed))
    }

    fn is_currency_whitelisted(&self, currency: Address) -> bool {
        self.currencies.contains(&currency)
    }

    fn treasury(&self) -> TreasuryData {
        self.treasury
    }
}

#[derive(Default)]
pub struct MockEnv {
    pub slots: BTreeMap<(Address, Vec<u8>), Vec<u8>>,
    pub balances: BTreeMap<(Address, Address), u128>,
    saved: Vec<Saved>,
}

type Saved = (
    BTreeMap<(Address, Vec<u8>), Vec<u8>>,
    BTreeMap<(Address, Address), u128>,
);

impl ModuleEnv for MockEnv {
    fn load_slot(&self, module: Address, key: &[u8]) -> Option<Vec<u8>> {
        self.slots.get(&(module, key.to_vec())).cloned()
    }

    fn store_slot(&mut self, module: Address, key: Vec<u8>, value: Option<Vec<u8>>) {
        match value {
            Some(v) => {
                self.slots.insert((module, key), v);
            }
            None => {
                self.slots.remove(&(module, key));
            }
        }
    }

    fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.balances.get(&(currency, holder)).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        currency: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), HubError> {
        let available = self.balance_of(currency, from);
        if available < amount {
            return Err(HubError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.balances.insert((currency, from), available - amount);
        *self.balances.entry((currency, to)).or_insert(0) += amount;
        Ok(())
    }

    fn savepoint(&mut self) -> usize {
        self.saved.push((self.slots.clone(), self.balances.clone()));
        self.saved.len() - 1
    }

    fn rollback_to(&mut self, savepoint: usize) {
        if savepoint < self.saved.len() {
            let (slots, balances) = self.saved.swap_remove(savepoint);
            self.saved.truncate(savepoint);
            self.slots = slots;
            self.balances = balances;
        }
    }
}
