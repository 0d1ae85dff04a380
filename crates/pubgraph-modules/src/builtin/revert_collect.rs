use bytes::Bytes;

use pubgraph_core::HubError;

use crate::context::ModuleContext;
use crate::error::ModuleResult;
use crate::traits::{CollectModule, InitParams, ProcessCollectParams};

/// Attaches cleanly but rejects every collect.
#[derive(Debug, Default)]
pub struct RevertCollectModule;

impl CollectModule for RevertCollectModule {
    fn name(&self) -> &str {
        "revert-collect"
    }

    fn initialize_publication_collect_module(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        Ok(Bytes::new())
    }

    fn process_collect(
        &self,
        _ctx: &mut ModuleContext<'_>,
        _params: &ProcessCollectParams<'_>,
    ) -> ModuleResult<Bytes> {
        Err(HubError::CollectNotAllowed.into())
    }
}
