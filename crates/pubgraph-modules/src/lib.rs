//! # pubgraph modules
//!
//! The extension-module layer of the publication graph.
//!
//! - [`CollectModule`] / [`ReferenceModule`] - the pluggable interfaces
//! - [`ModuleContext`] - what a module sees: a read-only [`GraphView`] plus
//!   its own storage and the fee-token ledger through [`ModuleEnv`]
//! - [`ModuleRegistry`] - deployed modules by address
//! - [`dispatch`] - calls with the legacy-interface fallback
//! - [`builtin`] - modules shipped with the hub

pub mod builtin;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod traits;

#[cfg(test)]
mod mock;

pub use context::{GraphView, ModuleContext, ModuleEnv};
pub use dispatch::ReferenceAction;
pub use error::{ModuleResult, ModuleRevert};
pub use registry::ModuleRegistry;
pub use traits::{
    CollectModule, InitParams, LegacyCollectParams, LegacyReferenceParams, ProcessCollectParams,
    ProcessReferenceParams, ReferenceModule,
};
