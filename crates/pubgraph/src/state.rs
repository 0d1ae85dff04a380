//! In-memory hub state.
//!
//! [`GraphState`] is what modules may read: profiles, access tables and the
//! publication map. [`Ledger`] is what modules may write: their own slots
//! and fee-token balances. The two are kept apart so a module call can
//! borrow the first shared and the second mutable at the same time.

use std::collections::BTreeMap;

use pubgraph_access::{is_access_namespace, AccessState, TreasuryData};
use pubgraph_core::{
    from_cbor, to_cbor, Address, CoreError, HubError, ProfileId, Publication, PublicationKey,
    PublicationView, SlotKey,
};
use pubgraph_modules::{GraphView, ModuleEnv};
use pubgraph_store::Snapshot;

use crate::journal::{Change, Journal};

/// Namespace of per-publication collect counters, keyed by publication.
pub const NS_COLLECTS: &str = "hub.collects";
/// Namespace of fee-token balances, keyed by `(currency, holder)`.
pub const NS_BALANCE: &str = "hub.balance";
/// Prefix of module storage namespaces, followed by the module address.
pub const NS_MODULE_PREFIX: &str = "module.";

pub fn module_namespace(module: Address) -> String {
    format!("{NS_MODULE_PREFIX}{}", module.to_hex())
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GraphState {
    pub(crate) access: AccessState,
    pub(crate) publications: BTreeMap<PublicationKey, Publication>,
    pub(crate) collect_counts: BTreeMap<PublicationKey, u64>,
}

impl GraphState {
    pub fn access(&self) -> &AccessState {
        &self.access
    }

    pub fn collect_count(&self, key: PublicationKey) -> u64 {
        self.collect_counts.get(&key).copied().unwrap_or(0)
    }

    /// Write a publication record, journaling the old one.
    pub(crate) fn write_publication(
        &mut self,
        journal: &mut Journal,
        key: PublicationKey,
        publication: Publication,
    ) {
        let prev = self.publications.insert(key, publication);
        journal.push(Change::Publication { key, prev });
    }

    /// Bump a publication's collect counter; returns the new value.
    pub(crate) fn increment_collects(
        &mut self,
        journal: &mut Journal,
        key: PublicationKey,
    ) -> Result<u64, HubError> {
        let count = self.collect_counts.entry(key).or_insert(0);
        let prev = *count;
        *count = prev
            .checked_add(1)
            .ok_or(HubError::InvalidParameter("collect counter overflow"))?;
        journal.push(Change::CollectCount {
            publication: key,
            prev,
        });
        Ok(*count)
    }
}

impl PublicationView for GraphState {
    fn publication(&self, key: PublicationKey) -> Option<&Publication> {
        self.publications.get(&key)
    }

    fn profile_exists(&self, profile_id: ProfileId) -> bool {
        self.access.profiles.exists(profile_id)
    }
}

impl GraphView for GraphState {
    fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.access.owner_of(profile_id)
    }

    fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.access.is_following(follower, followed)
    }

    fn is_currency_whitelisted(&self, currency: Address) -> bool {
        self.access.is_currency_whitelisted(currency)
    }

    fn treasury(&self) -> TreasuryData {
        self.access.treasury()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// Module storage and fee-token balances.
#[derive(Debug, Default)]
pub struct Ledger {
    pub(crate) slots: BTreeMap<(Address, Vec<u8>), Vec<u8>>,
    pub(crate) balances: BTreeMap<(Address, Address), u128>,
}

impl Ledger {
    pub fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.balances.get(&(currency, holder)).copied().unwrap_or(0)
    }

    pub fn slot(&self, module: Address, key: &[u8]) -> Option<&Vec<u8>> {
        self.slots.get(&(module, key.to_vec()))
    }

    pub(crate) fn set_balance(
        &mut self,
        journal: &mut Journal,
        currency: Address,
        holder: Address,
        amount: u128,
    ) {
        let prev = if amount == 0 {
            self.balances.remove(&(currency, holder))
        } else {
            self.balances.insert((currency, holder), amount)
        };
        journal.push(Change::Balance {
            currency,
            holder,
            prev: prev.unwrap_or(0),
        });
    }

    pub(crate) fn credit(
        &mut self,
        journal: &mut Journal,
        currency: Address,
        holder: Address,
        amount: u128,
    ) -> Result<(), HubError> {
        let balance = self
            .balance_of(currency, holder)
            .checked_add(amount)
            .ok_or(HubError::InvalidParameter("balance overflow"))?;
        self.set_balance(journal, currency, holder, balance);
        Ok(())
    }

    pub(crate) fn restore_balance(&mut self, currency: Address, holder: Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(&(currency, holder));
        } else {
            self.balances.insert((currency, holder), amount);
        }
    }

    pub(crate) fn restore_slot(&mut self, module: Address, key: Vec<u8>, value: Option<Vec<u8>>) {
        match value {
            Some(value) => {
                self.slots.insert((module, key), value);
            }
            None => {
                self.slots.remove(&(module, key));
            }
        }
    }
}

/// The [`ModuleEnv`] handed to modules: ledger writes, journaled.
pub(crate) struct EnvHandle<'a> {
    pub(crate) ledger: &'a mut Ledger,
    pub(crate) journal: &'a mut Journal,
}

impl ModuleEnv for EnvHandle<'_> {
    fn load_slot(&self, module: Address, key: &[u8]) -> Option<Vec<u8>> {
        self.ledger.slot(module, key).cloned()
    }

    fn store_slot(&mut self, module: Address, key: Vec<u8>, value: Option<Vec<u8>>) {
        let prev = match &value {
            Some(v) => self.ledger.slots.insert((module, key.clone()), v.clone()),
            None => self.ledger.slots.remove(&(module, key.clone())),
        };
        self.journal.push(Change::ModuleSlot { module, key, prev });
    }

    fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.ledger.balance_of(currency, holder)
    }

    fn transfer(
        &mut self,
        currency: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), HubError> {
        let available = self.ledger.balance_of(currency, from);
        if available < amount {
            return Err(HubError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        self.ledger
            .set_balance(self.journal, currency, from, available - amount);
        self.ledger.credit(self.journal, currency, to, amount)
    }

    fn savepoint(&mut self) -> usize {
        self.journal.len()
    }

    fn rollback_to(&mut self, savepoint: usize) {
        // Only ledger changes are recorded through a module environment.
        for change in self.journal.unwind(savepoint) {
            match change {
                Change::ModuleSlot { module, key, prev } => {
                    self.ledger.restore_slot(module, key, prev)
                }
                Change::Balance {
                    currency,
                    holder,
                    prev,
                } => self.ledger.restore_balance(currency, holder, prev),
                Change::Access(_) | Change::Publication { .. } | Change::CollectCount { .. } => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuild state from a store snapshot.
pub(crate) fn restore(snapshot: Snapshot) -> Result<(GraphState, Ledger), CoreError> {
    let mut graph = GraphState::default();
    let mut ledger = Ledger::default();

    for record in snapshot.profiles {
        graph.access.profiles.restore(record);
    }
    graph.publications.extend(snapshot.publications);

    for (slot, value) in snapshot.slots {
        if is_access_namespace(&slot.namespace) {
            graph.access.restore_slot(&slot, &value)?;
        } else if slot.namespace == NS_COLLECTS {
            let key: PublicationKey = from_cbor(&slot.key)?;
            graph.collect_counts.insert(key, from_cbor(&value)?);
        } else if slot.namespace == NS_BALANCE {
            let (currency, holder): (Address, Address) = from_cbor(&slot.key)?;
            ledger.restore_balance(currency, holder, from_cbor(&value)?);
        } else if let Some(hex) = slot.namespace.strip_prefix(NS_MODULE_PREFIX) {
            let module = Address::from_hex(hex)
                .map_err(|e| CoreError::DecodingError(format!("module namespace: {e}")))?;
            ledger.restore_slot(module, slot.key, Some(value));
        } else {
            return Err(CoreError::DecodingError(format!(
                "unknown slot namespace: {}",
                slot.namespace
            )));
        }
    }

    Ok((graph, ledger))
}

/// The slot a non-access change touched, with its current value.
pub(crate) fn hub_slot(
    graph: &GraphState,
    ledger: &Ledger,
    change: &Change,
) -> Result<Option<(SlotKey, Option<Vec<u8>>)>, CoreError> {
    let entry = match change {
        Change::Access(access) => match access.slot()? {
            Some(slot) => {
                let value = graph.access.slot_value(&slot)?;
                (slot, value)
            }
            None => return Ok(None),
        },
        Change::Publication { .. } => return Ok(None),
        Change::ModuleSlot { module, key, .. } => (
            SlotKey::new(module_namespace(*module), key.clone()),
            ledger.slot(*module, key).cloned(),
        ),
        Change::Balance {
            currency, holder, ..
        } => {
            let balance = ledger.balance_of(*currency, *holder);
            let value = if balance == 0 {
                None
            } else {
                Some(to_cbor(&balance)?)
            };
            (SlotKey::encode(NS_BALANCE, &(currency, holder))?, value)
        }
        Change::CollectCount { publication, .. } => (
            SlotKey::encode(NS_COLLECTS, publication)?,
            Some(to_cbor(&graph.collect_count(*publication))?),
        ),
    };
    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Address {
        Address::derive(b"token")
    }

    #[test]
    fn test_transfer_moves_and_journals() {
        let mut ledger = Ledger::default();
        let mut journal = Journal::new();
        let (alice, bob) = (Address::derive(b"alice"), Address::derive(b"bob"));
        ledger.credit(&mut journal, token(), alice, 100).unwrap();

        let mut env = EnvHandle {
            ledger: &mut ledger,
            journal: &mut journal,
        };
        env.transfer(token(), alice, bob, 30).unwrap();
        assert_eq!(
            env.transfer(token(), bob, alice, 31),
            Err(HubError::InsufficientBalance {
                required: 31,
                available: 30
            })
        );

        assert_eq!(ledger.balance_of(token(), alice), 70);
        assert_eq!(ledger.balance_of(token(), bob), 30);
        // credit, debit, credit
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn test_env_rollback_to_savepoint() {
        let mut ledger = Ledger::default();
        let mut journal = Journal::new();
        let module = Address::derive(b"module");
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        ledger.credit(&mut journal, token(), alice, 100).unwrap();

        let mut env = EnvHandle {
            ledger: &mut ledger,
            journal: &mut journal,
        };
        env.store_slot(module, vec![1], Some(vec![1]));
        let savepoint = env.savepoint();
        env.store_slot(module, vec![1], Some(vec![2]));
        env.store_slot(module, vec![2], Some(vec![9]));
        env.transfer(token(), alice, bob, 60).unwrap();
        env.rollback_to(savepoint);

        assert_eq!(env.load_slot(module, &[1]), Some(vec![1]));
        assert_eq!(env.load_slot(module, &[2]), None);
        assert_eq!(env.balance_of(token(), alice), 100);
        assert_eq!(env.balance_of(token(), bob), 0);
        // The credit and the first slot write survive.
        assert_eq!(journal.len(), savepoint);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_restore_round_trip_of_hub_slots() {
        let mut graph = GraphState::default();
        let mut ledger = Ledger::default();
        let mut journal = Journal::new();
        let key = PublicationKey::from((1, 1));
        let module = Address::derive(b"module");
        let holder = Address::derive(b"holder");

        graph.increment_collects(&mut journal, key).unwrap();
        graph.increment_collects(&mut journal, key).unwrap();
        ledger.credit(&mut journal, token(), holder, 5).unwrap();
        EnvHandle {
            ledger: &mut ledger,
            journal: &mut journal,
        }
        .store_slot(module, vec![1, 2], Some(vec![3]));

        let mut slots = Vec::new();
        for change in journal.changes() {
            if let Some((slot, Some(value))) = hub_slot(&graph, &ledger, change).unwrap() {
                slots.push((slot, value));
            }
        }
        let (graph2, ledger2) = restore(Snapshot {
            slots,
            ..Snapshot::default()
        })
        .unwrap();

        assert_eq!(graph2.collect_count(key), 2);
        assert_eq!(ledger2.balance_of(token(), holder), 5);
        assert_eq!(ledger2.slot(module, &[1, 2]), Some(&vec![3]));
    }

    #[test]
    fn test_unknown_namespace_rejected() {
        let snapshot = Snapshot {
            slots: vec![(SlotKey::new("mystery", vec![]), vec![])],
            ..Snapshot::default()
        };
        assert!(restore(snapshot).is_err());
    }
}
