//! Module revert semantics.

use pubgraph_core::HubError;
use thiserror::Error;

/// How a module call failed.
///
/// `Empty` models a call that reverted with no data, which is what calling
/// an entry point the module does not implement looks like. `Reason` carries
/// a decoded error that the hub re-raises verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleRevert {
    #[error("reverted without data")]
    Empty,

    #[error(transparent)]
    Reason(#[from] HubError),
}

/// Result type for module entry points.
pub type ModuleResult<T> = std::result::Result<T, ModuleRevert>;
