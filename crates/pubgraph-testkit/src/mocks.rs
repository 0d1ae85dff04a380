//! Mock modules for exercising dispatch paths.

use bytes::Bytes;

use pubgraph_core::{to_cbor, CoreError, HubError, PublicationKey};
use pubgraph_modules::{
    CollectModule, InitParams, LegacyCollectParams, LegacyReferenceParams, ModuleContext,
    ModuleResult, ModuleRevert, ProcessCollectParams, ProcessReferenceParams, ReferenceModule,
};

/// Data that makes [`VetoCollectModule`] reject a collect after writing.
pub const VETO: &[u8] = b"veto";

/// Counts collects in its own storage, then rejects when the collect data
/// is [`VETO`]. The write happens before the rejection so rollback is
/// observable.
#[derive(Debug, Default)]
pub struct VetoCollectModule;

impl VetoCollectModule {
    /// Raw storage key of the per-publication counter.
    pub fn counter_key(publication: PublicationKey) -> Result<Vec<u8>, CoreError> {
        to_cbor(&publication)
    }
}

impl CollectModule for VetoCollectModule {
    fn name(&self) -> &str {
        "mock-veto-collect"
    }

    fn initialize_publication_collect_module(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        ctx.save(&params.publication, &0u64)?;
        Ok(Bytes::from_static(b"ready"))
    }

    fn process_collect(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &ProcessCollectParams<'_>,
    ) -> ModuleResult<Bytes> {
        let count: u64 = ctx.load(&params.publication)?.unwrap_or(0);
        ctx.save(&params.publication, &(count + 1))?;
        if params.data == VETO {
            return Err(HubError::ModuleCustom {
                module: ctx.module(),
                reason: "vetoed".into(),
            }
            .into());
        }
        Ok(Bytes::new())
    }
}

/// A collect module deployed before `process_collect` existed.
#[derive(Debug, Default)]
pub struct LegacyCollectModule;

impl CollectModule for LegacyCollectModule {
    fn name(&self) -> &str {
        "mock-legacy-collect"
    }

    fn initialize_publication_collect_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Ok(Bytes::new())
    }

    fn legacy_process_collect(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &LegacyCollectParams<'_>,
    ) -> ModuleResult<()> {
        let count: u64 = ctx.load(&params.publication)?.unwrap_or(0);
        ctx.save(&params.publication, &(count + 1))
    }
}

/// A reference module that implements nothing: every entry point reverts
/// without data.
#[derive(Debug, Default)]
pub struct SilentReferenceModule;

impl ReferenceModule for SilentReferenceModule {
    fn name(&self) -> &str {
        "mock-silent-reference"
    }

    fn initialize_reference_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Ok(Bytes::new())
    }
}

/// A reference module with only the deprecated entry points, accepting
/// everything and counting calls per pointed publication.
#[derive(Debug, Default)]
pub struct CountingLegacyReferenceModule;

impl CountingLegacyReferenceModule {
    fn bump(ctx: &mut ModuleContext<'_>, pointed: PublicationKey) -> ModuleResult<()> {
        let count: u64 = ctx.load(&pointed)?.unwrap_or(0);
        ctx.save(&pointed, &(count + 1))
    }
}

impl ReferenceModule for CountingLegacyReferenceModule {
    fn name(&self) -> &str {
        "mock-counting-legacy-reference"
    }

    fn initialize_reference_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Ok(Bytes::new())
    }

    fn legacy_process_comment(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &LegacyReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Self::bump(ctx, params.pointed)
    }

    fn legacy_process_mirror(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &LegacyReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Self::bump(ctx, params.pointed)
    }
}

/// A reference module that rejects every interaction with a reason.
#[derive(Debug, Default)]
pub struct RejectingReferenceModule;

impl ReferenceModule for RejectingReferenceModule {
    fn name(&self) -> &str {
        "mock-rejecting-reference"
    }

    fn initialize_reference_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Ok(Bytes::new())
    }

    fn process_comment(
        &self,
        ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(reject(ctx))
    }

    fn process_quote(
        &self,
        ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(reject(ctx))
    }

    fn process_mirror(
        &self,
        ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(reject(ctx))
    }
}

fn reject(ctx: &ModuleContext<'_>) -> ModuleRevert {
    ModuleRevert::Reason(HubError::ModuleCustom {
        module: ctx.module(),
        reason: "rejected".into(),
    })
}
