//! Test fixtures and helpers.
//!
//! Common setup for integration tests: a registry with every built-in and
//! mock module at a fixed address, a config whitelisting all of them, and a
//! [`TestWorld`] wrapping a synchronous [`Engine`] with a controllable clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use pubgraph::{Clock, Engine, Hub, HubConfig};
use pubgraph_access::{TreasuryData, WhitelistKind};
use pubgraph_core::{
    Address, CollectParams, HubError, MirrorParams, PostParams, ProfileId, PublicationKey,
    ReferenceParams,
};
use pubgraph_modules::builtin::{
    FollowerOnlyReferenceModule, FreeCollectModule, LegacyFollowerOnlyReferenceModule,
    RevertCollectModule, SimpleFeeCollectModule,
};
use pubgraph_modules::ModuleRegistry;
use pubgraph_store::Store;

use crate::mocks::{
    CountingLegacyReferenceModule, LegacyCollectModule, RejectingReferenceModule,
    SilentReferenceModule, VetoCollectModule,
};

/// Fixed module, currency and treasury addresses.
pub mod addresses {
    use pubgraph_core::Address;

    pub const FREE_COLLECT: Address = Address([0x01; 20]);
    pub const FEE_COLLECT: Address = Address([0x02; 20]);
    pub const REVERT_COLLECT: Address = Address([0x03; 20]);
    pub const VETO_COLLECT: Address = Address([0x04; 20]);
    pub const LEGACY_COLLECT: Address = Address([0x05; 20]);

    pub const FOLLOWER_ONLY: Address = Address([0x11; 20]);
    pub const LEGACY_FOLLOWER_ONLY: Address = Address([0x12; 20]);
    pub const SILENT_REFERENCE: Address = Address([0x13; 20]);
    pub const COUNTING_LEGACY_REFERENCE: Address = Address([0x14; 20]);
    pub const REJECTING_REFERENCE: Address = Address([0x15; 20]);

    pub const CURRENCY: Address = Address([0x21; 20]);
    pub const TREASURY: Address = Address([0x31; 20]);
}

/// Treasury fee used by [`standard_config`], in bps.
pub const TREASURY_FEE_BPS: u16 = 250;

/// Starting timestamp of a [`TestWorld`] clock.
pub const GENESIS_MILLIS: i64 = 1_700_000_000_000;

/// Every built-in and mock module registered at its [`addresses`] entry.
pub fn standard_registry() -> ModuleRegistry {
    use addresses::*;

    let mut registry = ModuleRegistry::new();
    registry.register_collect(FREE_COLLECT, Arc::new(FreeCollectModule));
    registry.register_collect(FEE_COLLECT, Arc::new(SimpleFeeCollectModule));
    registry.register_collect(REVERT_COLLECT, Arc::new(RevertCollectModule));
    registry.register_collect(VETO_COLLECT, Arc::new(VetoCollectModule));
    registry.register_collect(LEGACY_COLLECT, Arc::new(LegacyCollectModule));

    registry.register_reference(FOLLOWER_ONLY, Arc::new(FollowerOnlyReferenceModule));
    registry.register_reference(
        LEGACY_FOLLOWER_ONLY,
        Arc::new(LegacyFollowerOnlyReferenceModule),
    );
    registry.register_reference(SILENT_REFERENCE, Arc::new(SilentReferenceModule));
    registry.register_reference(
        COUNTING_LEGACY_REFERENCE,
        Arc::new(CountingLegacyReferenceModule),
    );
    registry.register_reference(REJECTING_REFERENCE, Arc::new(RejectingReferenceModule));
    registry
}

/// A config whitelisting every module of [`standard_registry`] and
/// [`addresses::CURRENCY`], with the treasury taking [`TREASURY_FEE_BPS`].
pub fn standard_config() -> HubConfig {
    use addresses::*;

    let mut config = HubConfig::default().treasury(TREASURY, TREASURY_FEE_BPS);
    for module in [
        FREE_COLLECT,
        FEE_COLLECT,
        REVERT_COLLECT,
        VETO_COLLECT,
        LEGACY_COLLECT,
    ] {
        config = config.collect_module(module);
    }
    for module in [
        FOLLOWER_ONLY,
        LEGACY_FOLLOWER_ONLY,
        SILENT_REFERENCE,
        COUNTING_LEGACY_REFERENCE,
        REJECTING_REFERENCE,
    ] {
        config = config.reference_module(module);
    }
    config.currency(CURRENCY)
}

/// A fresh random address.
pub fn random_address() -> Address {
    Address(rand::random())
}

/// Open a hub over `store` with the standard registry and config.
pub async fn standard_hub<S: Store>(store: S) -> pubgraph::Result<Hub<S>> {
    Hub::open(store, standard_registry(), standard_config()).await
}

/// A controllable timestamp source.
#[derive(Debug, Clone)]
pub struct TestClock {
    millis: Arc<AtomicI64>,
}

impl TestClock {
    pub fn new(start: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn now(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// A [`Clock`] reading this source.
    pub fn clock(&self) -> Clock {
        let millis = Arc::clone(&self.millis);
        Arc::new(move || millis.load(Ordering::SeqCst))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(GENESIS_MILLIS)
    }
}

/// A profile and the address owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub address: Address,
    pub profile: ProfileId,
}

/// A synchronous engine with the standard registry, whitelists and
/// treasury applied.
pub struct TestWorld {
    pub engine: Engine,
    pub clock: TestClock,
}

impl TestWorld {
    pub fn new() -> Result<Self, HubError> {
        let clock = TestClock::default();
        let mut engine = Engine::new(standard_registry()).with_clock(clock.clock());
        let config = standard_config();
        let lists = [
            (WhitelistKind::CollectModule, &config.collect_modules),
            (WhitelistKind::ReferenceModule, &config.reference_modules),
            (WhitelistKind::Currency, &config.currencies),
        ];
        for (kind, list) in lists {
            for &address in list {
                engine.set_whitelisted(kind, address, true)?;
            }
        }
        engine.set_treasury(TreasuryData {
            treasury: config.treasury,
            fee_bps: config.treasury_fee_bps,
        })?;
        Ok(Self { engine, clock })
    }

    /// Create a profile owned by a fresh random address.
    pub fn actor(&mut self) -> Result<Actor, HubError> {
        let address = random_address();
        let profile = self.engine.create_profile(address)?;
        Ok(Actor { address, profile })
    }

    /// Create `n` actors.
    pub fn actors(&mut self, n: usize) -> Result<Vec<Actor>, HubError> {
        (0..n).map(|_| self.actor()).collect()
    }

    /// Post with the free collect module.
    pub fn post(&mut self, author: Actor) -> Result<PublicationKey, HubError> {
        let params = PostParams::new(author.profile, "ipfs://post", addresses::FREE_COLLECT);
        let pub_id = self.engine.post(&params, author.address)?;
        Ok(PublicationKey::new(author.profile, pub_id))
    }

    pub fn comment(
        &mut self,
        author: Actor,
        pointed: PublicationKey,
    ) -> Result<PublicationKey, HubError> {
        let params = ReferenceParams::new(
            author.profile,
            "ipfs://comment",
            pointed,
            addresses::FREE_COLLECT,
        );
        let pub_id = self.engine.comment(&params, author.address)?;
        Ok(PublicationKey::new(author.profile, pub_id))
    }

    pub fn quote(
        &mut self,
        author: Actor,
        pointed: PublicationKey,
    ) -> Result<PublicationKey, HubError> {
        let params =
            ReferenceParams::new(author.profile, "ipfs://quote", pointed, addresses::FREE_COLLECT);
        let pub_id = self.engine.quote(&params, author.address)?;
        Ok(PublicationKey::new(author.profile, pub_id))
    }

    pub fn mirror(
        &mut self,
        author: Actor,
        pointed: PublicationKey,
    ) -> Result<PublicationKey, HubError> {
        let pub_id = self
            .engine
            .mirror(&MirrorParams::new(author.profile, pointed), author.address)?;
        Ok(PublicationKey::new(author.profile, pub_id))
    }

    /// Collect as the actor, returning the collect nonce.
    pub fn collect(&mut self, collector: Actor, publication: PublicationKey) -> Result<u64, HubError> {
        self.engine
            .collect(&CollectParams::new(collector.profile, publication), collector.address)
    }
}
