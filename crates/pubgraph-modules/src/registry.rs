//! Deployed modules, keyed by address.
//!
//! Registration only makes a module callable. Whether the hub accepts it on
//! a new publication is decided by the governance whitelist, which is kept
//! separately in access state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pubgraph_core::Address;

use crate::traits::{CollectModule, ReferenceModule};

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    collect: HashMap<Address, Arc<dyn CollectModule>>,
    reference: HashMap<Address, Arc<dyn ReferenceModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a collect module at `address`, replacing any previous one.
    pub fn register_collect(&mut self, address: Address, module: Arc<dyn CollectModule>) {
        self.collect.insert(address, module);
    }

    /// Deploy a reference module at `address`, replacing any previous one.
    pub fn register_reference(&mut self, address: Address, module: Arc<dyn ReferenceModule>) {
        self.reference.insert(address, module);
    }

    pub fn collect(&self, address: Address) -> Option<Arc<dyn CollectModule>> {
        self.collect.get(&address).cloned()
    }

    pub fn reference(&self, address: Address) -> Option<Arc<dyn ReferenceModule>> {
        self.reference.get(&address).cloned()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("collect", &self.collect.len())
            .field("reference", &self.reference.len())
            .finish()
    }
}
