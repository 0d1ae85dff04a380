//! The publishing engine.
//!
//! A synchronous state machine over [`GraphState`] and [`Ledger`]. Every
//! operation runs against a checkpoint: on error all of its changes are
//! undone before the error is returned, so a rejected request leaves no
//! trace. Accepted changes stay in the journal until the owner of the engine
//! persists them ([`Engine::prepare_batch`] then [`Engine::commit`]) or
//! throws them away ([`Engine::rollback`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use pubgraph_access::{DelegationConfig, TreasuryData, WhitelistKind};
use pubgraph_core::{
    compute_root, now_millis, validate_pointed_pub, validate_referrer_and_get_referrer_pub_type,
    Address, CollectParams, CoreError, EventId, EventRecord, HubError, HubEvent, MirrorParams,
    ModuleFamily, PostParams, ProfileId, ProfileRecord, PubId, Publication, PublicationKey,
    PublicationType, PublicationView, ReferenceCreated, ReferenceKind, ReferenceParams,
};
use pubgraph_modules::dispatch::{self, ReferenceAction};
use pubgraph_modules::{
    InitParams, ModuleContext, ModuleRegistry, ProcessCollectParams, ProcessReferenceParams,
};
use pubgraph_store::{Snapshot, WriteBatch};

use crate::journal::{Change, Checkpoint, Journal};
use crate::state::{self, EnvHandle, GraphState, Ledger};

/// Source of operation timestamps (Unix ms).
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct Engine {
    graph: GraphState,
    ledger: Ledger,
    journal: Journal,
    registry: ModuleRegistry,
    clock: Clock,
    /// Timestamp of the operation in progress.
    now: i64,
    /// Last persisted event.
    head: (u64, EventId),
    /// Events of uncommitted operations, with their timestamps.
    pending: Vec<(i64, HubEvent)>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("profiles", &self.graph.access.profiles.len())
            .field("publications", &self.graph.publications.len())
            .field("head", &self.head)
            .field("uncommitted", &self.journal.len())
            .finish()
    }
}

impl Engine {
    /// An empty engine.
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            graph: GraphState::default(),
            ledger: Ledger::default(),
            journal: Journal::new(),
            registry,
            clock: Arc::new(now_millis),
            now: 0,
            head: (0, EventId::ZERO),
            pending: Vec::new(),
        }
    }

    /// Rebuild an engine from persisted state.
    pub fn from_snapshot(registry: ModuleRegistry, snapshot: Snapshot) -> Result<Self, CoreError> {
        let head = snapshot.event_head.unwrap_or((0, EventId::ZERO));
        let (graph, ledger) = state::restore(snapshot)?;
        Ok(Self {
            graph,
            ledger,
            head,
            ..Self::new(registry)
        })
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoints and commit
    // ─────────────────────────────────────────────────────────────────────────

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            changes: self.journal.len(),
            events: self.pending.len(),
        }
    }

    /// Undo everything recorded after `checkpoint`.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        for change in self.journal.unwind(checkpoint.changes) {
            match change {
                Change::Access(change) => self.graph.access.undo(&change),
                Change::Publication { key, prev } => match prev {
                    Some(publication) => {
                        self.graph.publications.insert(key, publication);
                    }
                    None => {
                        self.graph.publications.remove(&key);
                    }
                },
                Change::ModuleSlot { module, key, prev } => {
                    self.ledger.restore_slot(module, key, prev)
                }
                Change::Balance {
                    currency,
                    holder,
                    prev,
                } => self.ledger.restore_balance(currency, holder, prev),
                Change::CollectCount { publication, prev } => {
                    if prev == 0 {
                        self.graph.collect_counts.remove(&publication);
                    } else {
                        self.graph.collect_counts.insert(publication, prev);
                    }
                }
            }
        }
        self.pending.truncate(checkpoint.events);
    }

    /// Drop every uncommitted change.
    pub fn rollback(&mut self) {
        self.revert_to(Checkpoint::default());
    }

    /// Whether anything is waiting to be committed.
    pub fn has_uncommitted(&self) -> bool {
        !self.journal.is_empty() || !self.pending.is_empty()
    }

    /// Events accepted since the last commit.
    pub fn pending_events(&self) -> impl Iterator<Item = &HubEvent> {
        self.pending.iter().map(|(_, event)| event)
    }

    /// Build the write batch for everything uncommitted.
    ///
    /// Events are chained onto the last committed event here.
    pub fn prepare_batch(&self) -> Result<WriteBatch, CoreError> {
        let mut profiles = BTreeSet::new();
        let mut publications = BTreeSet::new();
        let mut slots = BTreeMap::new();

        for change in self.journal.changes() {
            match change {
                Change::Access(access) => {
                    if let Some(profile_id) = access.touched_profile() {
                        profiles.insert(profile_id);
                    }
                }
                Change::Publication { key, .. } => {
                    publications.insert(*key);
                }
                _ => {}
            }
            if let Some((slot, value)) = state::hub_slot(&self.graph, &self.ledger, change)? {
                slots.insert(slot, value);
            }
        }

        let mut batch = WriteBatch::new();
        batch.profiles = profiles
            .into_iter()
            .filter_map(|id| self.graph.access.profile(id).cloned())
            .collect();
        batch.publications = publications
            .into_iter()
            .filter_map(|key| self.graph.publications.get(&key).map(|p| (key, p.clone())))
            .collect();
        batch.slots = slots
            .into_iter()
            .map(|(slot, value)| pubgraph_core::SlotWrite { slot, value })
            .collect();

        let (mut seq, mut prev) = self.head;
        for (timestamp, event) in &self.pending {
            seq += 1;
            let record = EventRecord::chain(prev, seq, *timestamp, event.clone())?;
            prev = record.id;
            batch.events.push(record);
        }
        Ok(batch)
    }

    /// Mark `batch` (from [`prepare_batch`](Self::prepare_batch)) as persisted.
    pub fn commit(&mut self, batch: &WriteBatch) {
        if let Some(last) = batch.events.last() {
            self.head = (last.seq, last.id);
        }
        self.journal.clear();
        self.pending.clear();
    }

    /// Last committed event `(seq, id)`.
    pub fn head(&self) -> (u64, EventId) {
        self.head
    }

    fn atomic<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, HubError>,
    ) -> Result<T, HubError> {
        let checkpoint = self.checkpoint();
        self.now = (self.clock)();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.revert_to(checkpoint);
                debug!(error = %err, "operation reverted");
                Err(err)
            }
        }
    }

    fn emit(&mut self, event: HubEvent) {
        self.pending.push((self.now, event));
    }

    fn emit_all(&mut self, events: Vec<HubEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a post. Returns its publication id.
    pub fn post(&mut self, params: &PostParams, executor: Address) -> Result<PubId, HubError> {
        self.atomic(|engine| engine.post_inner(params, executor))
    }

    fn post_inner(&mut self, params: &PostParams, executor: Address) -> Result<PubId, HubError> {
        self.graph.access.authorize(params.profile_id, executor)?;
        let pub_id = self
            .graph
            .access
            .profiles
            .next_pub_id(&mut self.journal, params.profile_id)?;
        let key = PublicationKey::new(params.profile_id, pub_id);

        let mut publication = Publication::post(params.content_uri.clone());
        publication.collect_module = params.collect_module;
        publication.reference_module = params.reference_module;
        self.graph
            .write_publication(&mut self.journal, key, publication);

        let collect_module_return_data = self.init_collect_module(
            key,
            params.collect_module,
            &params.collect_module_init_data,
            executor,
        )?;
        let reference_module_return_data = self.init_reference_module(
            key,
            params.reference_module,
            &params.reference_module_init_data,
            executor,
        )?;

        self.emit(HubEvent::PostCreated {
            publication: key,
            content_uri: params.content_uri.clone(),
            collect_module: params.collect_module,
            collect_module_return_data,
            reference_module: params.reference_module,
            reference_module_return_data,
            executor,
        });
        debug!(publication = %key, %executor, "post created");
        Ok(pub_id)
    }

    pub fn comment(&mut self, params: &ReferenceParams, executor: Address) -> Result<PubId, HubError> {
        self.atomic(|engine| {
            engine.create_reference_publication(ReferenceKind::Comment, params, executor)
        })
    }

    pub fn quote(&mut self, params: &ReferenceParams, executor: Address) -> Result<PubId, HubError> {
        self.atomic(|engine| {
            engine.create_reference_publication(ReferenceKind::Quote, params, executor)
        })
    }

    /// The shared comment / quote path.
    fn create_reference_publication(
        &mut self,
        kind: ReferenceKind,
        params: &ReferenceParams,
        executor: Address,
    ) -> Result<PubId, HubError> {
        let owner = self.graph.access.authorize(params.profile_id, executor)?;
        let referrer_pub_type = self.validate_interaction(
            params.profile_id,
            params.pointed,
            params.referrer,
        )?;

        let pub_id = self
            .graph
            .access
            .profiles
            .next_pub_id(&mut self.journal, params.profile_id)?;
        let key = PublicationKey::new(params.profile_id, pub_id);
        let root = compute_root(&self.graph, params.pointed);
        if root.is_zero() {
            return Err(HubError::InvalidPointedPub);
        }

        let publication = Publication {
            pub_type: kind.pub_type(),
            content_uri: params.content_uri.clone(),
            pointed: params.pointed,
            root,
            collect_module: params.collect_module,
            reference_module: params.reference_module,
        };
        self.graph
            .write_publication(&mut self.journal, key, publication);

        let collect_module_return_data = self.init_collect_module(
            key,
            params.collect_module,
            &params.collect_module_init_data,
            executor,
        )?;
        let reference_module_return_data = self.init_reference_module(
            key,
            params.reference_module,
            &params.reference_module_init_data,
            executor,
        )?;

        let action = match kind {
            ReferenceKind::Comment => ReferenceAction::Comment,
            ReferenceKind::Quote => ReferenceAction::Quote,
        };
        self.process_reference(
            action,
            &ProcessReferenceParams {
                publication: key,
                executor,
                pointed: params.pointed,
                referrer: params.referrer,
                referrer_pub_type,
                data: &params.reference_module_data,
            },
            owner,
        )?;

        let created = ReferenceCreated {
            publication: key,
            content_uri: params.content_uri.clone(),
            pointed: params.pointed,
            root,
            referrer: params.referrer,
            referrer_pub_type,
            collect_module: params.collect_module,
            collect_module_return_data,
            reference_module: params.reference_module,
            reference_module_return_data,
            executor,
        };
        self.emit(match kind {
            ReferenceKind::Comment => HubEvent::CommentCreated(created),
            ReferenceKind::Quote => HubEvent::QuoteCreated(created),
        });
        debug!(
            publication = %key,
            pointed = %params.pointed,
            %root,
            kind = kind.pub_type().as_str(),
            "reference publication created"
        );
        Ok(pub_id)
    }

    pub fn mirror(&mut self, params: &MirrorParams, executor: Address) -> Result<PubId, HubError> {
        self.atomic(|engine| engine.mirror_inner(params, executor))
    }

    fn mirror_inner(&mut self, params: &MirrorParams, executor: Address) -> Result<PubId, HubError> {
        let owner = self.graph.access.authorize(params.profile_id, executor)?;
        let referrer_pub_type = self.validate_interaction(
            params.profile_id,
            params.pointed,
            params.referrer,
        )?;

        let pub_id = self
            .graph
            .access
            .profiles
            .next_pub_id(&mut self.journal, params.profile_id)?;
        let key = PublicationKey::new(params.profile_id, pub_id);
        self.graph
            .write_publication(&mut self.journal, key, Publication::mirror(params.pointed));

        self.process_reference(
            ReferenceAction::Mirror,
            &ProcessReferenceParams {
                publication: key,
                executor,
                pointed: params.pointed,
                referrer: params.referrer,
                referrer_pub_type,
                data: &params.reference_module_data,
            },
            owner,
        )?;

        self.emit(HubEvent::MirrorCreated {
            publication: key,
            pointed: params.pointed,
            referrer: params.referrer,
            referrer_pub_type,
            executor,
        });
        debug!(publication = %key, pointed = %params.pointed, "mirror created");
        Ok(pub_id)
    }

    /// Referrer first, then the pointed publication, then block status.
    fn validate_interaction(
        &self,
        acting: ProfileId,
        pointed: PublicationKey,
        referrer: PublicationKey,
    ) -> Result<PublicationType, HubError> {
        let referrer_pub_type =
            validate_referrer_and_get_referrer_pub_type(&self.graph, referrer, pointed)?;
        validate_pointed_pub(&self.graph, pointed)?;
        if self.graph.access.is_blocked(acting, pointed.profile_id) {
            return Err(HubError::Blocked);
        }
        Ok(referrer_pub_type)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Module calls
    // ─────────────────────────────────────────────────────────────────────────

    fn init_collect_module(
        &mut self,
        publication: PublicationKey,
        module: Address,
        data: &[u8],
        executor: Address,
    ) -> Result<Bytes, HubError> {
        if !self.graph.access.is_collect_module_whitelisted(module) {
            return Err(HubError::CollectModuleNotWhitelisted(module));
        }
        let implementation = self
            .registry
            .collect(module)
            .ok_or(HubError::ModuleRevertedWithoutReason(module))?;

        let mut env = EnvHandle {
            ledger: &mut self.ledger,
            journal: &mut self.journal,
        };
        let mut ctx = ModuleContext::new(module, &self.graph, &mut env, self.now);
        let return_data = dispatch::initialize_collect_module(
            implementation.as_ref(),
            &mut ctx,
            &InitParams {
                publication,
                executor,
                data,
            },
        )?;

        self.emit(HubEvent::ModuleInitialized {
            publication,
            family: ModuleFamily::Collect,
            module,
            return_data: return_data.clone(),
        });
        Ok(return_data)
    }

    /// Initialize the reference module, if any. Zero means unrestricted.
    fn init_reference_module(
        &mut self,
        publication: PublicationKey,
        module: Address,
        data: &[u8],
        executor: Address,
    ) -> Result<Bytes, HubError> {
        if module.is_zero() {
            return Ok(Bytes::new());
        }
        if !self.graph.access.is_reference_module_whitelisted(module) {
            return Err(HubError::ReferenceModuleNotWhitelisted(module));
        }
        let implementation = self
            .registry
            .reference(module)
            .ok_or(HubError::ModuleRevertedWithoutReason(module))?;

        let mut env = EnvHandle {
            ledger: &mut self.ledger,
            journal: &mut self.journal,
        };
        let mut ctx = ModuleContext::new(module, &self.graph, &mut env, self.now);
        let return_data = dispatch::initialize_reference_module(
            implementation.as_ref(),
            &mut ctx,
            &InitParams {
                publication,
                executor,
                data,
            },
        )?;

        self.emit(HubEvent::ModuleInitialized {
            publication,
            family: ModuleFamily::Reference,
            module,
            return_data: return_data.clone(),
        });
        Ok(return_data)
    }

    /// Notify the pointed publication's reference module, if it has one.
    fn process_reference(
        &mut self,
        action: ReferenceAction,
        params: &ProcessReferenceParams<'_>,
        acting_profile_owner: Address,
    ) -> Result<(), HubError> {
        let module = self
            .graph
            .publications
            .get(&params.pointed)
            .map(|p| p.reference_module)
            .unwrap_or_default();
        if module.is_zero() {
            return Ok(());
        }
        let implementation = self
            .registry
            .reference(module)
            .ok_or(HubError::ModuleRevertedWithoutReason(module))?;

        let mut env = EnvHandle {
            ledger: &mut self.ledger,
            journal: &mut self.journal,
        };
        let mut ctx = ModuleContext::new(module, &self.graph, &mut env, self.now);
        dispatch::process_reference(
            implementation.as_ref(),
            &mut ctx,
            action,
            params,
            acting_profile_owner,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Collect
    // ─────────────────────────────────────────────────────────────────────────

    /// Collect a publication. Returns the collect nonce (1-based).
    pub fn collect(&mut self, params: &CollectParams, executor: Address) -> Result<u64, HubError> {
        self.atomic(|engine| engine.collect_inner(params, executor))
    }

    fn collect_inner(&mut self, params: &CollectParams, executor: Address) -> Result<u64, HubError> {
        let collector_owner = self
            .graph
            .access
            .authorize(params.collector_profile_id, executor)?;

        let key = params.publication;
        let module = match self.graph.publications.get(&key) {
            None => return Err(HubError::PublicationDoesNotExist),
            Some(target) => match target.resolved_type() {
                PublicationType::Nonexistent => return Err(HubError::PublicationDoesNotExist),
                PublicationType::Mirror => return Err(HubError::CollectNotAllowed),
                _ if target.collect_module.is_zero() => return Err(HubError::CollectNotAllowed),
                _ => target.collect_module,
            },
        };

        if self
            .graph
            .access
            .is_blocked(params.collector_profile_id, key.profile_id)
        {
            return Err(HubError::Blocked);
        }
        let referrer_pub_type =
            validate_referrer_and_get_referrer_pub_type(&self.graph, params.referrer, key)?;

        let implementation = self
            .registry
            .collect(module)
            .ok_or(HubError::ModuleRevertedWithoutReason(module))?;
        let mut env = EnvHandle {
            ledger: &mut self.ledger,
            journal: &mut self.journal,
        };
        let mut ctx = ModuleContext::new(module, &self.graph, &mut env, self.now);
        let return_data = dispatch::process_collect(
            implementation.as_ref(),
            &mut ctx,
            &ProcessCollectParams {
                publication: key,
                collector_profile_id: params.collector_profile_id,
                collector_profile_owner: collector_owner,
                executor,
                referrer: params.referrer,
                referrer_pub_type,
                data: &params.collect_module_data,
            },
        )?;

        let collect_nonce = self.graph.increment_collects(&mut self.journal, key)?;
        self.emit(HubEvent::Collected {
            collector_profile_id: params.collector_profile_id,
            publication: key,
            referrer: params.referrer,
            referrer_pub_type,
            collect_nonce,
            executor,
            return_data,
        });
        debug!(
            publication = %key,
            collector = %params.collector_profile_id,
            collect_nonce,
            "collected"
        );
        Ok(collect_nonce)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profiles and social graph
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_profile(&mut self, to: Address) -> Result<ProfileId, HubError> {
        self.atomic(|engine| {
            let (profile_id, events) =
                engine
                    .graph
                    .access
                    .create_profile(&mut engine.journal, to, engine.now)?;
            engine.emit_all(events);
            Ok(profile_id)
        })
    }

    pub fn transfer_profile(
        &mut self,
        profile_id: ProfileId,
        from: Address,
        to: Address,
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events = engine.graph.access.transfer_profile(
                &mut engine.journal,
                profile_id,
                from,
                to,
            )?;
            engine.emit_all(events);
            debug!(%profile_id, %from, %to, "profile transferred");
            Ok(())
        })
    }

    pub fn change_delegated_executors_config(
        &mut self,
        caller: Address,
        profile_id: ProfileId,
        executors: &[Address],
        approvals: &[bool],
        config_number: u64,
        switch_to_given_config: bool,
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events = engine.graph.access.change_delegated_executors_config(
                &mut engine.journal,
                caller,
                profile_id,
                executors,
                approvals,
                config_number,
                switch_to_given_config,
            )?;
            engine.emit_all(events);
            Ok(())
        })
    }

    pub fn set_block_status(
        &mut self,
        executor: Address,
        by_profile_id: ProfileId,
        profile_ids: &[ProfileId],
        statuses: &[bool],
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events = engine.graph.access.set_block_status(
                &mut engine.journal,
                executor,
                by_profile_id,
                profile_ids,
                statuses,
            )?;
            engine.emit_all(events);
            Ok(())
        })
    }

    pub fn follow(
        &mut self,
        executor: Address,
        follower: ProfileId,
        targets: &[ProfileId],
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events =
                engine
                    .graph
                    .access
                    .follow(&mut engine.journal, executor, follower, targets)?;
            engine.emit_all(events);
            debug!(%follower, count = targets.len(), "followed");
            Ok(())
        })
    }

    pub fn unfollow(
        &mut self,
        executor: Address,
        follower: ProfileId,
        targets: &[ProfileId],
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events =
                engine
                    .graph
                    .access
                    .unfollow(&mut engine.journal, executor, follower, targets)?;
            engine.emit_all(events);
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_whitelisted(
        &mut self,
        kind: WhitelistKind,
        address: Address,
        whitelisted: bool,
    ) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events = engine.graph.access.set_whitelisted(
                &mut engine.journal,
                kind,
                address,
                whitelisted,
            )?;
            engine.emit_all(events);
            Ok(())
        })
    }

    pub fn set_treasury(&mut self, data: TreasuryData) -> Result<(), HubError> {
        self.atomic(|engine| {
            let events = engine
                .graph
                .access
                .set_treasury(&mut engine.journal, data)?;
            engine.emit_all(events);
            Ok(())
        })
    }

    /// Append an untagged record written before explicit tagging.
    ///
    /// The record is stored verbatim at the profile's next publication id,
    /// including a zero root on legacy comments.
    pub fn import_legacy_publication(
        &mut self,
        profile_id: ProfileId,
        record: Publication,
    ) -> Result<PubId, HubError> {
        self.atomic(|engine| {
            if !record.is_legacy() {
                return Err(HubError::InvalidParameter("legacy records carry no type tag"));
            }
            let pub_id = engine
                .graph
                .access
                .profiles
                .next_pub_id(&mut engine.journal, profile_id)?;
            let key = PublicationKey::new(profile_id, pub_id);
            let resolved = record.resolved_type();
            engine
                .graph
                .write_publication(&mut engine.journal, key, record);
            engine.emit(HubEvent::LegacyPublicationImported { publication: key });
            debug!(publication = %key, resolved = resolved.as_str(), "legacy publication imported");
            Ok(pub_id)
        })
    }

    /// Credit fee tokens to `holder`.
    pub fn deposit(&mut self, currency: Address, holder: Address, amount: u128) -> Result<(), HubError> {
        self.atomic(|engine| {
            if currency.is_zero() || holder.is_zero() {
                return Err(HubError::InvalidParameter("deposit to or of the zero address"));
            }
            engine
                .ledger
                .credit(&mut engine.journal, currency, holder, amount)?;
            engine.emit(HubEvent::Deposited {
                currency,
                holder,
                amount,
            });
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn profile(&self, profile_id: ProfileId) -> Option<&ProfileRecord> {
        self.graph.access.profile(profile_id)
    }

    pub fn owner_of(&self, profile_id: ProfileId) -> Option<Address> {
        self.graph.access.owner_of(profile_id)
    }

    /// The stored record; absent keys read as the all-zero record.
    pub fn publication(&self, key: PublicationKey) -> Publication {
        self.graph.publications.get(&key).cloned().unwrap_or_default()
    }

    pub fn publication_type(&self, key: PublicationKey) -> PublicationType {
        self.graph.publication_type(key)
    }

    pub fn is_approved_executor(&self, profile_id: ProfileId, executor: Address) -> bool {
        self.graph.access.is_approved_executor(profile_id, executor)
    }

    pub fn delegation_config(&self, profile_id: ProfileId) -> DelegationConfig {
        self.graph.access.delegation.config(profile_id)
    }

    pub fn is_blocked(&self, profile_id: ProfileId, by_profile_id: ProfileId) -> bool {
        self.graph.access.is_blocked(profile_id, by_profile_id)
    }

    pub fn is_following(&self, follower: ProfileId, followed: ProfileId) -> bool {
        self.graph.access.is_following(follower, followed)
    }

    pub fn is_collect_module_whitelisted(&self, module: Address) -> bool {
        self.graph.access.is_collect_module_whitelisted(module)
    }

    pub fn is_reference_module_whitelisted(&self, module: Address) -> bool {
        self.graph.access.is_reference_module_whitelisted(module)
    }

    pub fn is_currency_whitelisted(&self, currency: Address) -> bool {
        self.graph.access.is_currency_whitelisted(currency)
    }

    pub fn treasury(&self) -> TreasuryData {
        self.graph.access.treasury()
    }

    pub fn collect_count(&self, key: PublicationKey) -> u64 {
        self.graph.collect_count(key)
    }

    pub fn balance_of(&self, currency: Address, holder: Address) -> u128 {
        self.ledger.balance_of(currency, holder)
    }

    /// Raw module storage.
    pub fn module_slot(&self, module: Address, key: &[u8]) -> Option<Vec<u8>> {
        self.ledger.slot(module, key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::to_cbor;
    use pubgraph_modules::builtin::{
        FeeCollectData, FollowerOnlyReferenceModule, FreeCollectModule, RevertCollectModule,
        SimpleFeeCollectConfig, SimpleFeeCollectModule,
    };

    const FREE: Address = Address([0x01; 20]);
    const FEE: Address = Address([0x02; 20]);
    const REVERT: Address = Address([0x03; 20]);
    const FOLLOWER_ONLY: Address = Address([0x04; 20]);
    const TOKEN: Address = Address([0x05; 20]);

    struct Fixture {
        engine: Engine,
        alice: Address,
        bob: Address,
        a: ProfileId,
        b: ProfileId,
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register_collect(FREE, Arc::new(FreeCollectModule));
        registry.register_collect(FEE, Arc::new(SimpleFeeCollectModule));
        registry.register_collect(REVERT, Arc::new(RevertCollectModule));
        registry.register_reference(FOLLOWER_ONLY, Arc::new(FollowerOnlyReferenceModule));
        registry
    }

    fn fixture() -> Fixture {
        let mut engine = Engine::new(registry()).with_clock(Arc::new(|| 1_000));
        for module in [FREE, FEE, REVERT] {
            engine
                .set_whitelisted(WhitelistKind::CollectModule, module, true)
                .unwrap();
        }
        engine
            .set_whitelisted(WhitelistKind::ReferenceModule, FOLLOWER_ONLY, true)
            .unwrap();
        engine
            .set_whitelisted(WhitelistKind::Currency, TOKEN, true)
            .unwrap();

        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        let a = engine.create_profile(alice).unwrap();
        let b = engine.create_profile(bob).unwrap();
        Fixture {
            engine,
            alice,
            bob,
            a,
            b,
        }
    }

    fn post(f: &mut Fixture) -> PublicationKey {
        let id = f
            .engine
            .post(&PostParams::new(f.a, "ipfs://post", FREE), f.alice)
            .unwrap();
        PublicationKey::new(f.a, id)
    }

    #[test]
    fn test_post_assigns_dense_ids() {
        let mut f = fixture();
        assert_eq!(post(&mut f).pub_id, PubId(1));
        assert_eq!(post(&mut f).pub_id, PubId(2));
        assert_eq!(f.engine.profile(f.a).unwrap().pub_count, 2);
        assert_eq!(
            f.engine.publication_type(PublicationKey::from((1, 2))),
            PublicationType::Post
        );
    }

    #[test]
    fn test_post_requires_executor() {
        let mut f = fixture();
        assert_eq!(
            f.engine
                .post(&PostParams::new(f.a, "ipfs://x", FREE), f.bob),
            Err(HubError::ExecutorInvalid)
        );
        assert_eq!(
            f.engine
                .post(&PostParams::new(ProfileId(99), "ipfs://x", FREE), f.bob),
            Err(HubError::TokenDoesNotExist(ProfileId(99)))
        );
    }

    #[test]
    fn test_unwhitelisted_module_leaves_counter() {
        let mut f = fixture();
        let rogue = Address::derive(b"rogue");
        let before = f.engine.pending_events().count();
        assert_eq!(
            f.engine
                .post(&PostParams::new(f.a, "ipfs://x", rogue), f.alice),
            Err(HubError::CollectModuleNotWhitelisted(rogue))
        );
        assert_eq!(
            f.engine.post(
                &PostParams::new(f.a, "ipfs://x", FREE).reference_module(rogue, Bytes::new()),
                f.alice
            ),
            Err(HubError::ReferenceModuleNotWhitelisted(rogue))
        );
        assert_eq!(f.engine.profile(f.a).unwrap().pub_count, 0);
        assert_eq!(f.engine.pending_events().count(), before);
        assert_eq!(
            f.engine.publication(PublicationKey::from((1, 1))),
            Publication::default()
        );
    }

    #[test]
    fn test_comment_root_and_blocking() {
        let mut f = fixture();
        let p = post(&mut f);
        let c1 = f
            .engine
            .comment(&ReferenceParams::new(f.b, "ipfs://c1", p, FREE), f.bob)
            .unwrap();
        let c1 = PublicationKey::new(f.b, c1);
        let c2 = f
            .engine
            .comment(&ReferenceParams::new(f.a, "ipfs://c2", c1, FREE), f.alice)
            .unwrap();
        let c2 = PublicationKey::new(f.a, c2);
        assert_eq!(f.engine.publication(c1).root, p);
        assert_eq!(f.engine.publication(c2).root, p);

        f.engine
            .set_block_status(f.alice, f.a, &[f.b], &[true])
            .unwrap();
        assert_eq!(
            f.engine
                .quote(&ReferenceParams::new(f.b, "ipfs://q", p, FREE), f.bob),
            Err(HubError::Blocked)
        );
    }

    #[test]
    fn test_mirror_is_opaque() {
        let mut f = fixture();
        let p = post(&mut f);
        let m = f
            .engine
            .mirror(&MirrorParams::new(f.b, p), f.bob)
            .unwrap();
        let m = PublicationKey::new(f.b, m);
        let record = f.engine.publication(m);
        assert_eq!(record.pub_type, PublicationType::Mirror);
        assert!(record.content_uri.is_empty());
        assert!(record.root.is_zero());
        assert!(record.collect_module.is_zero());

        assert_eq!(
            f.engine
                .comment(&ReferenceParams::new(f.a, "ipfs://c", m, FREE), f.alice),
            Err(HubError::InvalidPointedPub)
        );
        assert_eq!(
            f.engine.collect(&CollectParams::new(f.a, m), f.alice),
            Err(HubError::CollectNotAllowed)
        );
    }

    #[test]
    fn test_reference_module_veto_reverts_everything() {
        let mut f = fixture();
        let p = f
            .engine
            .post(
                &PostParams::new(f.a, "ipfs://gated", FREE)
                    .reference_module(FOLLOWER_ONLY, Bytes::new()),
                f.alice,
            )
            .unwrap();
        let p = PublicationKey::new(f.a, p);
        let checkpoint = f.engine.checkpoint();

        assert_eq!(
            f.engine
                .comment(&ReferenceParams::new(f.b, "ipfs://c", p, FREE), f.bob),
            Err(HubError::NotFollowing)
        );
        assert_eq!(f.engine.checkpoint(), checkpoint);
        assert_eq!(f.engine.profile(f.b).unwrap().pub_count, 0);

        f.engine.follow(f.bob, f.b, &[f.a]).unwrap();
        assert!(f
            .engine
            .comment(&ReferenceParams::new(f.b, "ipfs://c", p, FREE), f.bob)
            .is_ok());
    }

    #[test]
    fn test_fee_collect_moves_balances() {
        let mut f = fixture();
        f.engine
            .set_treasury(TreasuryData {
                treasury: Address::derive(b"treasury"),
                fee_bps: 1_000,
            })
            .unwrap();
        let config = SimpleFeeCollectConfig {
            amount: 1_000,
            currency: TOKEN,
            recipient: f.alice,
            ..SimpleFeeCollectConfig::default()
        };
        let p = f
            .engine
            .post(
                &PostParams::new(f.a, "ipfs://paid", FEE).collect_init(to_cbor(&config).unwrap()),
                f.alice,
            )
            .unwrap();
        let p = PublicationKey::new(f.a, p);
        f.engine.deposit(TOKEN, f.bob, 1_500).unwrap();

        let data = to_cbor(&FeeCollectData {
            currency: TOKEN,
            amount: 1_000,
        })
        .unwrap();
        assert_eq!(
            f.engine
                .collect(&CollectParams::new(f.b, p).data(data.clone()), f.bob),
            Ok(1)
        );
        assert_eq!(f.engine.balance_of(TOKEN, f.bob), 500);
        assert_eq!(f.engine.balance_of(TOKEN, Address::derive(b"treasury")), 100);
        assert_eq!(f.engine.balance_of(TOKEN, f.alice), 900);

        // Second collect cannot be paid; nothing moves and the counter stays.
        assert!(matches!(
            f.engine.collect(&CollectParams::new(f.b, p).data(data), f.bob),
            Err(HubError::InsufficientBalance { .. })
        ));
        assert_eq!(f.engine.balance_of(TOKEN, f.bob), 500);
        assert_eq!(f.engine.collect_count(p), 1);
    }

    #[test]
    fn test_revert_collect_module() {
        let mut f = fixture();
        let p = f
            .engine
            .post(&PostParams::new(f.a, "ipfs://x", REVERT), f.alice)
            .unwrap();
        assert_eq!(
            f.engine
                .collect(&CollectParams::new(f.b, PublicationKey::new(f.a, p)), f.bob),
            Err(HubError::CollectNotAllowed)
        );
    }

    #[test]
    fn test_legacy_import_and_inference() {
        let mut f = fixture();
        let p = post(&mut f);
        let legacy = Publication {
            content_uri: "ipfs://old-comment".into(),
            pointed: p,
            collect_module: FREE,
            ..Publication::default()
        };
        let id = f.engine.import_legacy_publication(f.b, legacy).unwrap();
        let key = PublicationKey::new(f.b, id);
        assert_eq!(f.engine.publication_type(key), PublicationType::Comment);
        assert!(f.engine.publication(key).root.is_zero());

        // Collectible without ever running module initialization.
        assert_eq!(f.engine.collect(&CollectParams::new(f.a, key), f.alice), Ok(1));
        assert_eq!(f.engine.collect_count(key), 1);
        // Replies are rooted at the post the legacy comment sits under.
        let reply = f
            .engine
            .comment(&ReferenceParams::new(f.a, "ipfs://r", key, FREE), f.alice)
            .unwrap();
        assert_eq!(f.engine.publication(PublicationKey::new(f.a, reply)).root, p);

        assert_eq!(
            f.engine
                .import_legacy_publication(f.b, Publication::post("ipfs://tagged")),
            Err(HubError::InvalidParameter("legacy records carry no type tag"))
        );
    }

    #[test]
    fn test_batch_and_commit() {
        let mut f = fixture();
        let p = post(&mut f);
        let batch = f.engine.prepare_batch().unwrap();

        assert_eq!(batch.profiles.len(), 2);
        assert_eq!(batch.publications, vec![(p, f.engine.publication(p))]);
        assert!(batch.slots.iter().any(|w| w.slot.namespace == "access.whitelist.collect"));
        pubgraph_core::verify_chain(0, EventId::ZERO, &batch.events).unwrap();

        f.engine.commit(&batch);
        assert!(!f.engine.has_uncommitted());
        let last = batch.events.last().unwrap();
        assert_eq!(f.engine.head(), (last.seq, last.id));

        // Rolling back after a commit only drops what came later.
        post(&mut f);
        f.engine.rollback();
        assert_eq!(f.engine.profile(f.a).unwrap().pub_count, 1);
        assert_eq!(f.engine.publication(p).content_uri, "ipfs://post");
    }
}
