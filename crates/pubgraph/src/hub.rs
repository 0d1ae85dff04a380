//! The Hub: async facade over the engine and a store.
//!
//! Requests are serialized behind one async mutex. Each accepted operation
//! is persisted as one [`WriteBatch`](pubgraph_store::WriteBatch) before the
//! next request runs; if the store refuses the batch, the engine is rolled
//! back so memory and storage never diverge. A request dropped while its
//! batch was in flight is settled against the store's event head when the
//! next request arrives.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pubgraph_access::{DelegationConfig, TreasuryData, WhitelistKind};
use pubgraph_core::{
    verify_chain, Address, CollectParams, EventId, EventRecord, HubError, MirrorParams,
    PostParams, ProfileId, ProfileRecord, PubId, Publication, PublicationKey, PublicationType,
    ReferenceParams,
};
use pubgraph_modules::ModuleRegistry;
use pubgraph_store::Store;

use crate::config::HubConfig;
use crate::engine::{Clock, Engine};
use crate::error::{Error, Result};

/// Events fetched per page when verifying the log.
const VERIFY_PAGE: usize = 1024;

/// The main Hub struct.
pub struct Hub<S: Store> {
    store: Arc<S>,
    engine: Mutex<Engine>,
}

impl<S: Store> Hub<S> {
    /// Open a hub over `store`, restoring whatever it holds.
    ///
    /// On an empty store the config's treasury and whitelists are applied
    /// as the first operations.
    pub async fn open(store: S, registry: ModuleRegistry, config: HubConfig) -> Result<Self> {
        Self::open_with_clock(store, registry, config, None).await
    }

    /// [`open`](Self::open) with a custom timestamp source.
    pub async fn open_with_clock(
        store: S,
        registry: ModuleRegistry,
        config: HubConfig,
        clock: Option<Clock>,
    ) -> Result<Self> {
        let snapshot = store.load_snapshot().await?;
        let fresh = snapshot.event_head.is_none();

        if config.verify_chain_on_open {
            verify_log(&store, snapshot.event_head).await?;
        }

        let mut engine = Engine::from_snapshot(registry, snapshot)?;
        if let Some(clock) = clock {
            engine = engine.with_clock(clock);
        }

        info!(
            profiles = engine.graph().access().profiles.len(),
            head = engine.head().0,
            "hub opened"
        );

        let hub = Self {
            store: Arc::new(store),
            engine: Mutex::new(engine),
        };
        if fresh && config.has_genesis() {
            hub.apply_genesis(&config).await?;
        }
        Ok(hub)
    }

    async fn apply_genesis(&self, config: &HubConfig) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let lists = [
            (WhitelistKind::CollectModule, &config.collect_modules),
            (WhitelistKind::ReferenceModule, &config.reference_modules),
            (WhitelistKind::Currency, &config.currencies),
        ];
        for (kind, addresses) in lists {
            for &address in addresses {
                if let Err(e) = engine.set_whitelisted(kind, address, true) {
                    engine.rollback();
                    return Err(e.into());
                }
            }
        }
        if !config.treasury.is_zero() || config.treasury_fee_bps != 0 {
            let data = TreasuryData {
                treasury: config.treasury,
                fee_bps: config.treasury_fee_bps,
            };
            if let Err(e) = engine.set_treasury(data) {
                engine.rollback();
                return Err(e.into());
            }
        }
        self.persist(&mut engine).await
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one engine operation and persist its effects.
    async fn transact<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Engine) -> std::result::Result<T, HubError> + Send,
        T: Send,
    {
        let mut engine = self.engine.lock().await;
        self.resync(&mut engine).await?;
        let value = op(&mut engine)?;
        self.persist(&mut engine).await?;
        Ok(value)
    }

    /// Settle changes left behind by a request that was dropped mid-persist.
    ///
    /// The store applies a batch atomically, so its event head tells whether
    /// the pending batch landed: commit it if so, roll it back otherwise.
    async fn resync(&self, engine: &mut Engine) -> Result<()> {
        if !engine.has_uncommitted() {
            return Ok(());
        }
        let batch = match engine.prepare_batch() {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "unpersisted changes could not be batched, reverting");
                engine.rollback();
                return Ok(());
            }
        };
        let pending = batch.events.last().map(|r| (r.seq, r.id));
        let stored = self.store.event_head().await?;
        if pending.is_some() && stored == pending {
            warn!(
                events = batch.events.len(),
                head = stored.map_or(0, |(seq, _)| seq),
                "interrupted batch reached the store, committing"
            );
            engine.commit(&batch);
        } else {
            warn!(
                events = batch.events.len(),
                "interrupted batch never reached the store, reverting"
            );
            engine.rollback();
        }
        Ok(())
    }

    async fn persist(&self, engine: &mut Engine) -> Result<()> {
        let batch = match engine.prepare_batch() {
            Ok(batch) => batch,
            Err(e) => {
                engine.rollback();
                return Err(e.into());
            }
        };
        if batch.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.store.apply_batch(&batch).await {
            warn!(error = %e, events = batch.events.len(), "persisting batch failed, reverting");
            engine.rollback();
            return Err(e.into());
        }
        debug!(
            profiles = batch.profiles.len(),
            publications = batch.publications.len(),
            slots = batch.slots.len(),
            events = batch.events.len(),
            "batch persisted"
        );
        engine.commit(&batch);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn post(&self, params: PostParams, executor: Address) -> Result<PubId> {
        self.transact(move |engine| engine.post(&params, executor))
            .await
    }

    pub async fn comment(&self, params: ReferenceParams, executor: Address) -> Result<PubId> {
        self.transact(move |engine| engine.comment(&params, executor))
            .await
    }

    pub async fn quote(&self, params: ReferenceParams, executor: Address) -> Result<PubId> {
        self.transact(move |engine| engine.quote(&params, executor))
            .await
    }

    pub async fn mirror(&self, params: MirrorParams, executor: Address) -> Result<PubId> {
        self.transact(move |engine| engine.mirror(&params, executor))
            .await
    }

    /// Collect a publication; returns the collect nonce.
    pub async fn collect(&self, params: CollectParams, executor: Address) -> Result<u64> {
        self.transact(move |engine| engine.collect(&params, executor))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profiles and social graph
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_profile(&self, to: Address) -> Result<ProfileId> {
        self.transact(move |engine| engine.create_profile(to)).await
    }

    pub async fn transfer_profile(
        &self,
        profile_id: ProfileId,
        from: Address,
        to: Address,
    ) -> Result<()> {
        self.transact(move |engine| engine.transfer_profile(profile_id, from, to))
            .await
    }

    pub async fn change_delegated_executors_config(
        &self,
        caller: Address,
        profile_id: ProfileId,
        executors: Vec<Address>,
        approvals: Vec<bool>,
        config_number: u64,
        switch_to_given_config: bool,
    ) -> Result<()> {
        self.transact(move |engine| {
            engine.change_delegated_executors_config(
                caller,
                profile_id,
                &executors,
                &approvals,
                config_number,
                switch_to_given_config,
            )
        })
        .await
    }

    pub async fn set_block_status(
        &self,
        executor: Address,
        by_profile_id: ProfileId,
        profile_ids: Vec<ProfileId>,
        statuses: Vec<bool>,
    ) -> Result<()> {
        self.transact(move |engine| {
            engine.set_block_status(executor, by_profile_id, &profile_ids, &statuses)
        })
        .await
    }

    pub async fn follow(
        &self,
        executor: Address,
        follower: ProfileId,
        targets: Vec<ProfileId>,
    ) -> Result<()> {
        self.transact(move |engine| engine.follow(executor, follower, &targets))
            .await
    }

    pub async fn unfollow(
        &self,
        executor: Address,
        follower: ProfileId,
        targets: Vec<ProfileId>,
    ) -> Result<()> {
        self.transact(move |engine| engine.unfollow(executor, follower, &targets))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn set_whitelisted(
        &self,
        kind: WhitelistKind,
        address: Address,
        whitelisted: bool,
    ) -> Result<()> {
        self.transact(move |engine| engine.set_whitelisted(kind, address, whitelisted))
            .await
    }

    pub async fn set_treasury(&self, data: TreasuryData) -> Result<()> {
        self.transact(move |engine| engine.set_treasury(data)).await
    }

    pub async fn import_legacy_publication(
        &self,
        profile_id: ProfileId,
        record: Publication,
    ) -> Result<PubId> {
        self.transact(move |engine| engine.import_legacy_publication(profile_id, record))
            .await
    }

    pub async fn deposit(&self, currency: Address, holder: Address, amount: u128) -> Result<()> {
        self.transact(move |engine| engine.deposit(currency, holder, amount))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn profile(&self, profile_id: ProfileId) -> Option<ProfileRecord> {
        self.engine.lock().await.profile(profile_id).cloned()
    }

    pub async fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.engine.lock().await.owner_of(profile_id)
    }

    /// The stored record; absent keys read as the all-zero record.
    pub async fn publication(&self, key: PublicationKey) -> Publication {
        self.engine.lock().await.publication(key)
    }

    pub async fn publication_type(&self, key: PublicationKey) -> PublicationType {
        self.engine.lock().await.publication_type(key)
    }

    pub async fn is_approved_executor(&self, profile_id: ProfileId, executor: Address) -> bool {
        self.engine
            .lock()
            .await
            .is_approved_executor(profile_id, executor)
    }

    pub async fn delegation_config(&self, profile_id: ProfileId) -> DelegationConfig {
        self.engine.lock().await.delegation_config(profile_id)
    }

    pub async fn is_blocked(&self, profile_id: ProfileId, by_profile_id: ProfileId) -> bool {
        self.engine.lock().await.is_blocked(profile_id, by_profile_id)
    }

    pub async fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.engine.lock().await.is_following(follower, followed)
    }

    pub async fn is_collect_module_whitelisted(&self, module: Address) -> bool {
        self.engine.lock().await.is_collect_module_whitelisted(module)
    }

    pub async fn is_reference_module_whitelisted(&self, module: Address) -> bool {
        self.engine
            .lock()
            .await
            .is_reference_module_whitelisted(module)
    }

    pub async fn is_currency_whitelisted(&self, currency: Address) -> bool {
        self.engine.lock().await.is_currency_whitelisted(currency)
    }

    pub async fn treasury(&self) -> TreasuryData {
        self.engine.lock().await.treasury()
    }

    pub async fn collect_count(&self, key: PublicationKey) -> u64 {
        self.engine.lock().await.collect_count(key)
    }

    pub async fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.engine.lock().await.balance_of(currency, holder)
    }

    pub async fn module_slot(&self, module: Address, key: &[u8]) -> Option<Vec<u8>> {
        self.engine.lock().await.module_slot(module, key)
    }

    /// Persisted events with `seq > after_seq`.
    pub async fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self.store.get_events_since(after_seq, limit).await?)
    }

    /// Last persisted event `(seq, id)`.
    pub async fn event_head(&self) -> (u64, EventId) {
        self.engine.lock().await.head()
    }
}

/// Re-hash the stored log and check it ends at `head`.
async fn verify_log<S: Store>(store: &S, head: Option<(u64, EventId)>) -> Result<()> {
    let mut position = (0u64, EventId::ZERO);
    loop {
        let page = store.get_events_since(position.0, VERIFY_PAGE).await?;
        let Some(last) = page.last() else {
            break;
        };
        verify_chain(position.0, position.1, &page)
            .map_err(|e| Error::Corrupt(format!("event log: {e}")))?;
        position = (last.seq, last.id);
    }

    let expected = head.unwrap_or((0, EventId::ZERO));
    if position != expected {
        return Err(Error::Corrupt(format!(
            "event log ends at seq {} but head is seq {}",
            position.0, expected.0
        )));
    }
    debug!(events = position.0, "event log verified");
    Ok(())
}
