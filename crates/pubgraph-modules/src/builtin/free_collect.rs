use bytes::Bytes;
use serde::{Deserialize, Serialize};

use pubgraph_core::{to_cbor, HubError};

use super::{decode_init, follows_or_is};
use crate::context::ModuleContext;
use crate::error::ModuleResult;
use crate::traits::{CollectModule, InitParams, ProcessCollectParams};

/// Per-publication config of [`FreeCollectModule`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeCollectConfig {
    pub followers_only: bool,
}

/// Anyone (or only followers) may collect, at no cost.
///
/// Publications that never ran initialization, such as imported legacy
/// records, collect under the default open config.
#[derive(Debug, Default)]
pub struct FreeCollectModule;

impl CollectModule for FreeCollectModule {
    fn name(&self) -> &str {
        "free-collect"
    }

    fn initialize_publication_collect_module(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        let config: FreeCollectConfig = decode_init(params.data)?;
        ctx.save(&params.publication, &config)?;
        let encoded = to_cbor(&config).map_err(|_| HubError::InitParamsInvalid)?;
        Ok(Bytes::from(encoded))
    }

    fn process_collect(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &ProcessCollectParams<'_>,
    ) -> ModuleResult<Bytes> {
        let config: FreeCollectConfig = ctx.load(&params.publication)?.unwrap_or_default();
        if config.followers_only
            && !follows_or_is(
                ctx.graph(),
                params.collector_profile_id,
                params.publication.profile_id,
            )
        {
            return Err(HubError::NotFollowing.into());
        }
        Ok(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleRevert;
    use crate::mock::{MockEnv, MockGraph};
    use pubgraph_core::{Address, ProfileId, PublicationKey, PublicationType};

    const MODULE: Address = Address([0x01; 20]);

    fn collect_params(collector: u64) -> ProcessCollectParams<'static> {
        ProcessCollectParams {
            publication: PublicationKey::from((1, 1)),
            collector_profile_id: ProfileId(collector),
            collector_profile_owner: Address::derive(b"collector"),
            executor: Address::derive(b"collector"),
            referrer: PublicationKey::ZERO,
            referrer_pub_type: PublicationType::Nonexistent,
            data: &[],
        }
    }

    fn init(ctx: &mut ModuleContext<'_>, config: FreeCollectConfig) {
        let data = to_cbor(&config).unwrap();
        let params = InitParams {
            publication: PublicationKey::from((1, 1)),
            executor: Address::derive(b"author"),
            data: &data,
        };
        FreeCollectModule
            .initialize_publication_collect_module(ctx, &params)
            .unwrap();
    }

    #[test]
    fn test_open_collect() {
        let graph = MockGraph::default();
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        init(&mut ctx, FreeCollectConfig::default());
        assert!(FreeCollectModule
            .process_collect(&mut ctx, &collect_params(2))
            .is_ok());
    }

    #[test]
    fn test_followers_only() {
        let mut graph = MockGraph::default();
        graph.follows.insert((ProfileId(3), ProfileId(1)));
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        init(&mut ctx, FreeCollectConfig { followers_only: true });

        assert_eq!(
            FreeCollectModule.process_collect(&mut ctx, &collect_params(2)),
            Err(ModuleRevert::Reason(HubError::NotFollowing))
        );
        assert!(FreeCollectModule
            .process_collect(&mut ctx, &collect_params(3))
            .is_ok());
        // The author can always collect their own publication.
        assert!(FreeCollectModule
            .process_collect(&mut ctx, &collect_params(1))
            .is_ok());
    }

    #[test]
    fn test_uninitialized_publication_collects_openly() {
        let graph = MockGraph::default();
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        assert_eq!(
            FreeCollectModule.process_collect(&mut ctx, &collect_params(2)),
            Ok(Bytes::new())
        );
    }

    #[test]
    fn test_garbage_init_data() {
        let graph = MockGraph::default();
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        let params = InitParams {
            publication: PublicationKey::from((1, 1)),
            executor: Address::derive(b"author"),
            data: &[0xff, 0xff],
        };
        assert_eq!(
            FreeCollectModule.initialize_publication_collect_module(&mut ctx, &params),
            Err(ModuleRevert::Reason(HubError::InitParamsInvalid))
        );
    }
}
