//! What a module sees while it runs.
//!
//! Modules get a read-only [`GraphView`] of the hub (in which the publication
//! being created is already fully written) and a mutable [`ModuleEnv`] for
//! their own storage and for fee-token transfers. Both are wrapped in a
//! [`ModuleContext`] that scopes storage to the calling module's address.

use serde::de::DeserializeOwned;
use serde::Serialize;

use pubgraph_access::TreasuryData;
use pubgraph_core::{from_cbor, to_cbor, Address, CoreError, HubError, ProfileId, PublicationView};

use crate::error::{ModuleResult, ModuleRevert};

/// Read-only hub state visible to modules.
pub trait GraphView: PublicationView {
    fn owner_of(&self, profile_id: ProfileId) -> Option<Address>;

    fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool;

    fn is_currency_whitelisted(&self, currency: Address) -> bool;

    fn treasury(&self) -> TreasuryData;
}

/// Mutable module-owned state.
///
/// Implementations journal every write so the hub can roll a failed
/// operation back.
pub trait ModuleEnv {
    fn load_slot(&self, module: Address, key: &[u8]) -> Option<Vec<u8>>;

    /// Write a slot; `None` deletes it.
    fn store_slot(&mut self, module: Address, key: Vec<u8>, value: Option<Vec<u8>>);

    fn balance_of(&self, currency: Address, holder: Address) -> u128;

    /// Move fee tokens. Fails with `InsufficientBalance`.
    fn transfer(
        &mut self,
        currency: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), HubError>;

    /// Mark the current slot and balance state.
    fn savepoint(&mut self) -> usize;

    /// Discard every slot write and transfer made after `savepoint`.
    fn rollback_to(&mut self, savepoint: usize);
}

/// A module call's view of the world.
pub struct ModuleContext<'a> {
    module: Address,
    graph: &'a dyn GraphView,
    env: &'a mut dyn ModuleEnv,
    timestamp: i64,
}

impl<'a> ModuleContext<'a> {
    pub fn new(
        module: Address,
        graph: &'a dyn GraphView,
        env: &'a mut dyn ModuleEnv,
        timestamp: i64,
    ) -> Self {
        Self {
            module,
            graph,
            env,
            timestamp,
        }
    }

    /// Address of the module being called.
    pub fn module(&self) -> Address {
        self.module
    }

    pub fn graph(&self) -> &dyn GraphView {
        self.graph
    }

    /// Unix ms of the operation.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Load a typed value from this module's storage.
    pub fn load<K, V>(&self, key: &K) -> ModuleResult<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let key = to_cbor(key).map_err(|e| self.storage_error(e))?;
        match self.env.load_slot(self.module, &key) {
            Some(bytes) => from_cbor(&bytes)
                .map(Some)
                .map_err(|e| self.storage_error(e)),
            None => Ok(None),
        }
    }

    /// Store a typed value in this module's storage.
    pub fn save<K, V>(&mut self, key: &K, value: &V) -> ModuleResult<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = to_cbor(key).map_err(|e| self.storage_error(e))?;
        let value = to_cbor(value).map_err(|e| self.storage_error(e))?;
        self.env.store_slot(self.module, key, Some(value));
        Ok(())
    }

    pub fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.env.balance_of(currency, holder)
    }

    /// Transfer fee tokens; zero amounts are a no-op.
    pub fn transfer(
        &mut self,
        currency: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> ModuleResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.env
            .transfer(currency, from, to, amount)
            .map_err(ModuleRevert::Reason)
    }

    pub(crate) fn savepoint(&mut self) -> usize {
        self.env.savepoint()
    }

    pub(crate) fn rollback_to(&mut self, savepoint: usize) {
        self.env.rollback_to(savepoint);
    }

    fn storage_error(&self, err: CoreError) -> ModuleRevert {
        ModuleRevert::Reason(HubError::ModuleCustom {
            module: self.module,
            reason: err.to_string(),
        })
    }
}
