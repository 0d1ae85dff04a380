//! Modules shipped with the hub.

mod fee;
mod follower_only;
mod free_collect;
mod revert_collect;

pub use fee::{
    split_fee, FeeCollectData, FeeSplit, SimpleFeeCollectConfig, SimpleFeeCollectModule,
};
pub use follower_only::{FollowerOnlyReferenceModule, LegacyFollowerOnlyReferenceModule};
pub use free_collect::{FreeCollectConfig, FreeCollectModule};
pub use revert_collect::RevertCollectModule;

use serde::de::DeserializeOwned;

use pubgraph_core::{from_cbor, HubError, ProfileId};

use crate::context::GraphView;
use crate::error::{ModuleResult, ModuleRevert};

/// Decode init data; empty data yields the default config.
fn decode_init<T: DeserializeOwned + Default>(data: &[u8]) -> ModuleResult<T> {
    if data.is_empty() {
        return Ok(T::default());
    }
    from_cbor(data).map_err(|_| ModuleRevert::Reason(HubError::InitParamsInvalid))
}

/// Whether `actor` follows `target`, counting a profile as following itself.
fn follows_or_is(graph: &dyn GraphView, actor: ProfileId, target: ProfileId) -> bool {
    actor == target || graph.is_following(actor, target)
}
