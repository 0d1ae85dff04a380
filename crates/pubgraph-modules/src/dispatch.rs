//! Module calls with legacy fallback.
//!
//! The modern entry point is always tried first. A revert that carries an
//! error is re-raised unchanged. An empty revert means the module predates
//! the modern interface; the hub then retries through the legacy entry point,
//! but only when the acting address is the acting profile's owner, since the
//! legacy interface cannot tell an owner from a delegated executor. Writes the
//! modern call made before reverting are discarded before the retry.

use bytes::Bytes;
use tracing::warn;

use pubgraph_core::{Address, HubError};

use crate::context::ModuleContext;
use crate::error::{ModuleResult, ModuleRevert};
use crate::traits::{
    CollectModule, InitParams, LegacyCollectParams, LegacyReferenceParams, ProcessCollectParams,
    ProcessReferenceParams, ReferenceModule,
};

/// Which reference notification to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAction {
    Comment,
    Quote,
    Mirror,
}

impl ReferenceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceAction::Comment => "comment",
            ReferenceAction::Quote => "quote",
            ReferenceAction::Mirror => "mirror",
        }
    }
}

/// Turn a module revert into the error the hub raises.
fn raise<T>(module: Address, result: ModuleResult<T>) -> Result<T, HubError> {
    match result {
        Ok(value) => Ok(value),
        Err(ModuleRevert::Reason(err)) => Err(err),
        Err(ModuleRevert::Empty) => Err(HubError::ModuleRevertedWithoutReason(module)),
    }
}

pub fn initialize_collect_module(
    module: &dyn CollectModule,
    ctx: &mut ModuleContext<'_>,
    params: &InitParams<'_>,
) -> Result<Bytes, HubError> {
    let address = ctx.module();
    raise(
        address,
        module.initialize_publication_collect_module(ctx, params),
    )
}

pub fn initialize_reference_module(
    module: &dyn ReferenceModule,
    ctx: &mut ModuleContext<'_>,
    params: &InitParams<'_>,
) -> Result<Bytes, HubError> {
    let address = ctx.module();
    raise(address, module.initialize_reference_module(ctx, params))
}

/// Run a collect through the publication's collect module.
pub fn process_collect(
    module: &dyn CollectModule,
    ctx: &mut ModuleContext<'_>,
    params: &ProcessCollectParams<'_>,
) -> Result<Bytes, HubError> {
    let address = ctx.module();
    let savepoint = ctx.savepoint();
    match module.process_collect(ctx, params) {
        Ok(data) => Ok(data),
        Err(ModuleRevert::Reason(err)) => Err(err),
        Err(ModuleRevert::Empty) => {
            ctx.rollback_to(savepoint);
            if params.executor != params.collector_profile_owner {
                return Err(HubError::ExecutorInvalid);
            }
            warn!(
                module = %address,
                name = module.name(),
                publication = %params.publication,
                "collect module lacks processCollect, using legacy interface"
            );
            let legacy = LegacyCollectParams {
                referrer_profile_id: params.referrer.profile_id,
                collector: params.collector_profile_owner,
                publication: params.publication,
                data: params.data,
            };
            raise(address, module.legacy_process_collect(ctx, &legacy)).map(|()| Bytes::new())
        }
    }
}

/// Notify the pointed publication's reference module.
///
/// `acting_profile_owner` is the owner of `params.profile_id()`.
pub fn process_reference(
    module: &dyn ReferenceModule,
    ctx: &mut ModuleContext<'_>,
    action: ReferenceAction,
    params: &ProcessReferenceParams<'_>,
    acting_profile_owner: Address,
) -> Result<(), HubError> {
    let address = ctx.module();
    let savepoint = ctx.savepoint();
    let modern = match action {
        ReferenceAction::Comment => module.process_comment(ctx, params),
        ReferenceAction::Quote => module.process_quote(ctx, params),
        ReferenceAction::Mirror => module.process_mirror(ctx, params),
    };

    match modern {
        Ok(()) => Ok(()),
        Err(ModuleRevert::Reason(err)) => Err(err),
        Err(ModuleRevert::Empty) => {
            ctx.rollback_to(savepoint);
            if params.executor != acting_profile_owner {
                return Err(HubError::ExecutorInvalid);
            }
            warn!(
                module = %address,
                name = module.name(),
                action = action.as_str(),
                publication = %params.publication,
                "reference module lacks modern entry point, using legacy interface"
            );
            let legacy = LegacyReferenceParams {
                profile_id: params.profile_id(),
                pointed: params.pointed,
                data: params.data,
            };
            let result = match action {
                ReferenceAction::Comment | ReferenceAction::Quote => {
                    module.legacy_process_comment(ctx, &legacy)
                }
                ReferenceAction::Mirror => module.legacy_process_mirror(ctx, &legacy),
            };
            raise(address, result)
        }
    }
}
