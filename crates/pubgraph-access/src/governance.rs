//! Governance-controlled registries: module and currency whitelists, treasury.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pubgraph_core::{Address, HubError};

use crate::change::{AccessChange, AccessJournal};

/// Basis-point denominator.
pub const BPS_MAX: u16 = 10_000;

/// Which whitelist an address is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhitelistKind {
    CollectModule,
    ReferenceModule,
    Currency,
}

/// Treasury address and fee taken on paid collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryData {
    pub treasury: Address,
    pub fee_bps: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Governance {
    collect_modules: BTreeSet<Address>,
    reference_modules: BTreeSet<Address>,
    currencies: BTreeSet<Address>,
    treasury: TreasuryData,
}

impl Governance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_whitelisted(&self, kind: WhitelistKind, address: Address) -> bool {
        self.list(kind).contains(&address)
    }

    pub fn whitelisted(&self, kind: WhitelistKind) -> impl Iterator<Item = &Address> {
        self.list(kind).iter()
    }

    pub fn treasury(&self) -> TreasuryData {
        self.treasury
    }

    pub fn set_whitelisted(
        &mut self,
        journal: &mut dyn AccessJournal,
        kind: WhitelistKind,
        address: Address,
        whitelisted: bool,
    ) -> Result<(), HubError> {
        if address.is_zero() {
            return Err(HubError::InvalidParameter("cannot whitelist the zero address"));
        }
        let list = self.list_mut(kind);
        let prev = if whitelisted {
            !list.insert(address)
        } else {
            list.remove(&address)
        };
        journal.record(AccessChange::Whitelist {
            kind,
            address,
            prev,
        });
        Ok(())
    }

    pub fn set_treasury(
        &mut self,
        journal: &mut dyn AccessJournal,
        data: TreasuryData,
    ) -> Result<(), HubError> {
        if data.fee_bps > BPS_MAX {
            return Err(HubError::InvalidParameter("treasury fee above 10000 bps"));
        }
        let prev = std::mem::replace(&mut self.treasury, data);
        journal.record(AccessChange::Treasury { prev });
        Ok(())
    }

    pub(crate) fn restore_whitelisted(&mut self, kind: WhitelistKind, address: Address) {
        self.list_mut(kind).insert(address);
    }

    pub(crate) fn restore_treasury(&mut self, data: TreasuryData) {
        self.treasury = data;
    }

    fn list(&self, kind: WhitelistKind) -> &BTreeSet<Address> {
        match kind {
            WhitelistKind::CollectModule => &self.collect_modules,
            WhitelistKind::ReferenceModule => &self.reference_modules,
            WhitelistKind::Currency => &self.currencies,
        }
    }

    fn list_mut(&mut self, kind: WhitelistKind) -> &mut BTreeSet<Address> {
        match kind {
            WhitelistKind::CollectModule => &mut self.collect_modules,
            WhitelistKind::ReferenceModule => &mut self.reference_modules,
            WhitelistKind::Currency => &mut self.currencies,
        }
    }

    pub(crate) fn undo(&mut self, change: &AccessChange) {
        match change {
            AccessChange::Whitelist {
                kind,
                address,
                prev,
            } => {
                let list = self.list_mut(*kind);
                if *prev {
                    list.insert(*address);
                } else {
                    list.remove(address);
                }
            }
            AccessChange::Treasury { prev } => self.treasury = *prev,
            _ => {}
        }
    }
}
