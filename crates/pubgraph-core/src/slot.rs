//! Namespaced key/value slots.
//!
//! All hub state that is not a profile or publication record (approvals,
//! follows, blocks, whitelists, balances, module storage) persists as slots:
//! an opaque CBOR key under a namespace string.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::to_cbor;
use crate::error::CoreError;

/// Address of one slot.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub namespace: String,
    pub key: Vec<u8>,
}

impl SlotKey {
    pub fn new(namespace: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            namespace: namespace.into(),
            key,
        }
    }

    /// A slot whose key is the CBOR encoding of `key`.
    pub fn encode<K: Serialize + ?Sized>(
        namespace: impl Into<String>,
        key: &K,
    ) -> Result<Self, CoreError> {
        Ok(Self::new(namespace, to_cbor(key)?))
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({}/{})", self.namespace, hex::encode(&self.key))
    }
}

/// A slot write: `None` deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWrite {
    pub slot: SlotKey,
    pub value: Option<Vec<u8>>,
}
