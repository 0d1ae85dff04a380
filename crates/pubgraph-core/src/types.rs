//! Strong type definitions for pubgraph.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Zero is
//! the "absent" sentinel for every numeric identifier and for [`Address`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A profile identifier. Profiles are numbered from 1; 0 means "none".
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProfileId(pub u64);

impl ProfileId {
    /// The zero profile ID (no profile).
    pub const ZERO: Self = Self(0);

    /// Whether this is the zero sentinel.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileId({})", self.0)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProfileId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A publication identifier, scoped to its profile. Dense and 1-based.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PubId(pub u64);

impl PubId {
    /// The zero publication ID (no publication).
    pub const ZERO: Self = Self(0);

    /// Whether this is the zero sentinel.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubId({})", self.0)
    }
}

impl fmt::Display for PubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PubId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The composite key of a publication: `(profile_id, pub_id)`.
///
/// Ordering is by profile first, then publication, so a range scan over one
/// profile yields its publications in creation order.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PublicationKey {
    pub profile_id: ProfileId,
    pub pub_id: PubId,
}

impl PublicationKey {
    /// The `(0, 0)` key, meaning "no publication".
    pub const ZERO: Self = Self {
        profile_id: ProfileId::ZERO,
        pub_id: PubId::ZERO,
    };

    pub const fn new(profile_id: ProfileId, pub_id: PubId) -> Self {
        Self { profile_id, pub_id }
    }

    /// Whether both halves are zero.
    pub const fn is_zero(&self) -> bool {
        self.profile_id.is_zero() && self.pub_id.is_zero()
    }
}

impl fmt::Debug for PublicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pub({}-{})", self.profile_id.0, self.pub_id.0)
    }
}

impl fmt::Display for PublicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.profile_id.0, self.pub_id.0)
    }
}

impl From<(u64, u64)> for PublicationKey {
    fn from((profile_id, pub_id): (u64, u64)) -> Self {
        Self::new(ProfileId(profile_id), PubId(pub_id))
    }
}

/// A 20-byte account or module address.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (no module, no account).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive a stable address from a label.
    ///
    /// Used to give deployed modules and test accounts deterministic
    /// addresses: the last 20 bytes of `Blake3("pubgraph-address-v0:" || label)`.
    pub fn derive(label: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"pubgraph-address-v0:");
        hasher.update(label);
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest.as_bytes()[12..]);
        Self(out)
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 20] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Ledger-side record of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_id: ProfileId,

    /// The current owning address.
    pub owner: Address,

    /// Publications ever created under this profile. Only incremented.
    pub pub_count: u64,

    /// Creation timestamp (Unix ms).
    pub created_at: i64,
}

impl ProfileRecord {
    pub fn new(profile_id: ProfileId, owner: Address, created_at: i64) -> Self {
        Self {
            profile_id,
            owner,
            pub_count: 0,
            created_at,
        }
    }
}

/// Which extension-module family an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleFamily {
    Collect,
    Reference,
}

impl ModuleFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleFamily::Collect => "collect",
            ModuleFamily::Reference => "reference",
        }
    }
}

impl fmt::Display for ModuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_bytes([0x42; 20]);
        let recovered = Address::from_hex(&addr.to_string()).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn test_address_derive_is_stable_and_distinct() {
        assert_eq!(Address::derive(b"alice"), Address::derive(b"alice"));
        assert_ne!(Address::derive(b"alice"), Address::derive(b"bob"));
        assert!(!Address::derive(b"alice").is_zero());
    }

    #[test]
    fn test_publication_key_ordering() {
        let a = PublicationKey::from((1, 9));
        let b = PublicationKey::from((2, 1));
        let c = PublicationKey::from((1, 10));
        assert!(a < c);
        assert!(c < b);
        assert!(PublicationKey::ZERO.is_zero());
        assert!(!a.is_zero());
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(Address::from_hex("0xabcd").is_err());
    }
}
