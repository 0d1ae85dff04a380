//! Collect and reference module interfaces.
//!
//! Every entry point has a default body that reverts with no data. A module
//! implements the entry points it supports; the hub treats an empty revert
//! from a modern entry point as "not implemented" and may retry through the
//! matching legacy entry point.

use bytes::Bytes;

use pubgraph_core::{Address, ProfileId, PublicationKey, PublicationType};

use crate::context::ModuleContext;
use crate::error::{ModuleResult, ModuleRevert};

/// Arguments of a module initialization.
#[derive(Debug, Clone, Copy)]
pub struct InitParams<'a> {
    /// The publication the module is attached to.
    pub publication: PublicationKey,
    pub executor: Address,
    pub data: &'a [u8],
}

/// Arguments of a modern collect.
#[derive(Debug, Clone, Copy)]
pub struct ProcessCollectParams<'a> {
    pub publication: PublicationKey,
    pub collector_profile_id: ProfileId,
    pub collector_profile_owner: Address,
    pub executor: Address,
    pub referrer: PublicationKey,
    pub referrer_pub_type: PublicationType,
    pub data: &'a [u8],
}

/// Arguments of the deprecated collect entry point.
#[derive(Debug, Clone, Copy)]
pub struct LegacyCollectParams<'a> {
    pub referrer_profile_id: ProfileId,
    pub collector: Address,
    pub publication: PublicationKey,
    pub data: &'a [u8],
}

/// Arguments of a modern comment, quote or mirror notification.
#[derive(Debug, Clone, Copy)]
pub struct ProcessReferenceParams<'a> {
    /// The publication being created.
    pub publication: PublicationKey,
    pub executor: Address,
    pub pointed: PublicationKey,
    pub referrer: PublicationKey,
    pub referrer_pub_type: PublicationType,
    pub data: &'a [u8],
}

impl ProcessReferenceParams<'_> {
    /// The acting profile.
    pub fn profile_id(&self) -> ProfileId {
        self.publication.profile_id
    }
}

/// Arguments of the deprecated reference entry points.
#[derive(Debug, Clone, Copy)]
pub struct LegacyReferenceParams<'a> {
    pub profile_id: ProfileId,
    pub pointed: PublicationKey,
    pub data: &'a [u8],
}

/// A module governing who may collect a publication, and at what price.
pub trait CollectModule: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    fn initialize_publication_collect_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Err(ModuleRevert::Empty)
    }

    fn process_collect(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &ProcessCollectParams<'_>,
    ) -> ModuleResult<Bytes> {
        Err(ModuleRevert::Empty)
    }

    fn legacy_process_collect(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &LegacyCollectParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }
}

/// A module governing comments, quotes and mirrors of a publication.
pub trait ReferenceModule: Send + Sync {
    fn name(&self) -> &str;

    fn initialize_reference_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Err(ModuleRevert::Empty)
    }

    fn process_comment(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }

    fn process_quote(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }

    fn process_mirror(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }

    /// Deprecated; also the fallback for quotes.
    fn legacy_process_comment(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &LegacyReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }

    fn legacy_process_mirror(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &LegacyReferenceParams<'_>,
    ) -> ModuleResult<()> {
        Err(ModuleRevert::Empty)
    }
}
