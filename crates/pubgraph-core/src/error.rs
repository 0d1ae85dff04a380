//! Error types for pubgraph core.

use thiserror::Error;

use crate::types::{Address, ProfileId};

/// Protocol errors. Every failure aborts the whole operation.
///
/// Module-raised variants are produced by collect/reference modules and
/// surface to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    // Authorization
    #[error("acting address is neither owner nor approved executor")]
    ExecutorInvalid,

    #[error("caller is not the profile owner")]
    NotProfileOwner,

    #[error("profile {0} does not exist")]
    TokenDoesNotExist(ProfileId),

    #[error("profile is blocked")]
    Blocked,

    #[error("a profile cannot block itself")]
    SelfBlock,

    #[error("a profile cannot follow itself")]
    SelfFollow,

    #[error("already following")]
    AlreadyFollowing,

    #[error("not following")]
    NotFollowing,

    // Graph integrity
    #[error("publication does not exist")]
    PublicationDoesNotExist,

    #[error("invalid pointed publication")]
    InvalidPointedPub,

    #[error("invalid referrer")]
    InvalidReferrer,

    #[error("publication is not collectible")]
    CollectNotAllowed,

    // Module configuration
    #[error("collect module {0} is not whitelisted")]
    CollectModuleNotWhitelisted(Address),

    #[error("reference module {0} is not whitelisted")]
    ReferenceModuleNotWhitelisted(Address),

    #[error("invalid module init params")]
    InitParamsInvalid,

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("module {0} reverted without a reason")]
    ModuleRevertedWithoutReason(Address),

    // Module-raised
    #[error("collect window has ended")]
    CollectExpired,

    #[error("collect limit reached")]
    MintLimitExceeded,

    #[error("module data does not match the configured parameters")]
    ModuleDataMismatch,

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("module {module} rejected the call: {reason}")]
    ModuleCustom { module: Address, reason: String },
}

/// Encoding errors in core serialization helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("unknown publication type tag: {0}")]
    UnknownPublicationType(u8),

    #[error("unknown event kind: {0}")]
    UnknownEventKind(u16),

    #[error("event chain broken at seq {seq}")]
    ChainBroken { seq: u64 },
}
