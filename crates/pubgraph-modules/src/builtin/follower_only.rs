//! Reference modules restricting interactions to followers.

use bytes::Bytes;

use pubgraph_core::{HubError, ProfileId};

use super::follows_or_is;
use crate::context::{GraphView, ModuleContext};
use crate::error::ModuleResult;
use crate::traits::{InitParams, LegacyReferenceParams, ProcessReferenceParams, ReferenceModule};

fn require_follower(graph: &dyn GraphView, actor: ProfileId, pointed_profile: ProfileId) -> ModuleResult<()> {
    if follows_or_is(graph, actor, pointed_profile) {
        Ok(())
    } else {
        Err(HubError::NotFollowing.into())
    }
}

/// Only followers of the pointed profile (or the profile itself) may
/// comment, quote or mirror.
#[derive(Debug, Default)]
pub struct FollowerOnlyReferenceModule;

impl ReferenceModule for FollowerOnlyReferenceModule {
    fn name(&self) -> &str {
        "follower-only-reference"
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
        params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        require_follower(ctx.graph(), params.profile_id(), params.pointed.profile_id)
    }

    fn process_quote(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        require_follower(ctx.graph(), params.profile_id(), params.pointed.profile_id)
    }

    fn process_mirror(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &ProcessReferenceParams<'_>,
    ) -> ModuleResult<()> {
        require_follower(ctx.graph(), params.profile_id(), params.pointed.profile_id)
    }
}

/// The same rule, deployed before the modern interface existed.
#[derive(Debug, Default)]
pub struct LegacyFollowerOnlyReferenceModule;

impl ReferenceModule for LegacyFollowerOnlyReferenceModule {
    fn name(&self) -> &str {
        "legacy-follower-only-reference"
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
        require_follower(ctx.graph(), params.profile_id, params.pointed.profile_id)
    }

    fn legacy_process_mirror(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &LegacyReferenceParams<'_>,
    ) -> ModuleResult<()> {
        require_follower(ctx.graph(), params.profile_id, params.pointed.profile_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{process_reference, ReferenceAction};
    use crate::error::ModuleRevert;
    use crate::mock::{MockEnv, MockGraph};
    use pubgraph_core::{Address, PublicationKey, PublicationType};

    const MODULE: Address = Address([0x04; 20]);

    fn params(actor: u64, executor: Address) -> ProcessReferenceParams<'static> {
        ProcessReferenceParams {
            publication: PublicationKey::from((actor, 1)),
            executor,
            pointed: PublicationKey::from((1, 1)),
            referrer: PublicationKey::ZERO,
            referrer_pub_type: PublicationType::Nonexistent,
            data: &[],
        }
    }

    #[test]
    fn test_modern_rule() {
        let mut graph = MockGraph::default();
        graph.follows.insert((ProfileId(2), ProfileId(1)));
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        let exec = Address::derive(b"any");

        assert!(FollowerOnlyReferenceModule
            .process_comment(&mut ctx, &params(2, exec))
            .is_ok());
        assert_eq!(
            FollowerOnlyReferenceModule.process_mirror(&mut ctx, &params(3, exec)),
            Err(ModuleRevert::Reason(HubError::NotFollowing))
        );
    }

    #[test]
    fn test_legacy_module_through_dispatch() {
        let mut graph = MockGraph::default();
        graph.follows.insert((ProfileId(2), ProfileId(1)));
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 0);
        let owner = Address::derive(b"owner");

        for action in [ReferenceAction::Comment, ReferenceAction::Quote, ReferenceAction::Mirror] {
            assert_eq!(
                process_reference(
                    &LegacyFollowerOnlyReferenceModule,
                    &mut ctx,
                    action,
                    &params(2, owner),
                    owner
                ),
                Ok(())
            );
            assert_eq!(
                process_reference(
                    &LegacyFollowerOnlyReferenceModule,
                    &mut ctx,
                    action,
                    &params(3, owner),
                    owner
                ),
                Err(HubError::NotFollowing)
            );
        }
    }
}
