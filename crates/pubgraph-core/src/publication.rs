//! Publication: a content or pointer record under a profile.
//!
//! A publication is written once, at creation, and never edited. Absent
//! records read as the all-zero [`Publication`], which classifies as
//! [`PublicationType::Nonexistent`].

use serde::{Deserialize, Serialize};

use crate::types::{Address, PublicationKey};

/// The kind of a publication.
///
/// The discriminant is the stored tag. Records created before tagging carry
/// tag 0 and are classified from their other fields, see
/// [`Publication::resolved_type`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PublicationType {
    /// No publication, or an untagged legacy record (tag 0).
    #[default]
    Nonexistent = 0,
    Post = 1,
    Comment = 2,
    Mirror = 3,
    Quote = 4,
}

impl PublicationType {
    /// Convert to u8 for storage.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Nonexistent),
            1 => Some(Self::Post),
            2 => Some(Self::Comment),
            3 => Some(Self::Mirror),
            4 => Some(Self::Quote),
            _ => None,
        }
    }

    /// Comments and quotes carry a root and their own modules.
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Comment | Self::Quote)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nonexistent => "nonexistent",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Mirror => "mirror",
            Self::Quote => "quote",
        }
    }
}

/// A stored publication record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Stored type tag. `Nonexistent` here means "untagged".
    pub pub_type: PublicationType,

    /// Pointer to off-ledger content. Empty for mirrors.
    pub content_uri: String,

    /// The publication this one references (zero for posts).
    pub pointed: PublicationKey,

    /// The top-of-thread post (zero for posts and mirrors).
    pub root: PublicationKey,

    /// Module governing collects. Zero means not collectible.
    pub collect_module: Address,

    /// Module governing comments, quotes and mirrors. Zero means unrestricted.
    pub reference_module: Address,
}

impl Publication {
    /// A freshly tagged post.
    pub fn post(content_uri: impl Into<String>) -> Self {
        Self {
            pub_type: PublicationType::Post,
            content_uri: content_uri.into(),
            ..Self::default()
        }
    }

    /// A freshly tagged comment or quote. Root is filled in by the engine.
    pub fn reference(
        pub_type: PublicationType,
        content_uri: impl Into<String>,
        pointed: PublicationKey,
    ) -> Self {
        Self {
            pub_type,
            content_uri: content_uri.into(),
            pointed,
            ..Self::default()
        }
    }

    /// A freshly tagged mirror: a pure pointer.
    pub fn mirror(pointed: PublicationKey) -> Self {
        Self {
            pub_type: PublicationType::Mirror,
            pointed,
            ..Self::default()
        }
    }

    /// Classify the record.
    ///
    /// A non-zero tag is used directly. Untagged records fall back to the
    /// legacy rule:
    ///
    /// | pointed profile | collect module | type |
    /// |---|---|---|
    /// | non-zero | zero | Mirror |
    /// | non-zero | non-zero | Comment |
    /// | zero | non-zero | Post |
    /// | zero | zero | Nonexistent |
    pub fn resolved_type(&self) -> PublicationType {
        if self.pub_type != PublicationType::Nonexistent {
            return self.pub_type;
        }
        match (
            self.pointed.profile_id.is_zero(),
            self.collect_module.is_zero(),
        ) {
            (false, true) => PublicationType::Mirror,
            (false, false) => PublicationType::Comment,
            (true, false) => PublicationType::Post,
            (true, true) => PublicationType::Nonexistent,
        }
    }

    /// Whether this record was written before explicit tagging.
    pub fn is_legacy(&self) -> bool {
        self.pub_type == PublicationType::Nonexistent
    }
}
