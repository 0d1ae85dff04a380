//! Request parameters for publishing operations.
//!
//! Comments and quotes share one parameter shape, [`ReferenceParams`]; the
//! engine tags the request with a [`ReferenceKind`] instead of duplicating
//! the struct.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::publication::PublicationType;
use crate::types::{Address, ProfileId, PublicationKey};

/// Parameters of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostParams {
    pub profile_id: ProfileId,
    pub content_uri: String,
    pub collect_module: Address,
    pub collect_module_init_data: Bytes,
    pub reference_module: Address,
    pub reference_module_init_data: Bytes,
}

impl PostParams {
    /// A post with the given collect module and no reference module.
    pub fn new(profile_id: ProfileId, content_uri: impl Into<String>, collect_module: Address) -> Self {
        Self {
            profile_id,
            content_uri: content_uri.into(),
            collect_module,
            collect_module_init_data: Bytes::new(),
            reference_module: Address::ZERO,
            reference_module_init_data: Bytes::new(),
        }
    }

    /// Set the collect module init data.
    pub fn collect_init(mut self, data: impl Into<Bytes>) -> Self {
        self.collect_module_init_data = data.into();
        self
    }

    /// Set the reference module and its init data.
    pub fn reference_module(mut self, module: Address, data: impl Into<Bytes>) -> Self {
        self.reference_module = module;
        self.reference_module_init_data = data.into();
        self
    }
}

/// Parameters shared by comments and quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceParams {
    pub profile_id: ProfileId,
    pub content_uri: String,
    pub pointed: PublicationKey,
    pub referrer: PublicationKey,
    /// Opaque data forwarded to the pointed publication's reference module.
    pub reference_module_data: Bytes,
    pub collect_module: Address,
    pub collect_module_init_data: Bytes,
    pub reference_module: Address,
    pub reference_module_init_data: Bytes,
}

/// Parameters of a comment.
pub type CommentParams = ReferenceParams;

/// Parameters of a quote.
pub type QuoteParams = ReferenceParams;

impl ReferenceParams {
    pub fn new(
        profile_id: ProfileId,
        content_uri: impl Into<String>,
        pointed: PublicationKey,
        collect_module: Address,
    ) -> Self {
        Self {
            profile_id,
            content_uri: content_uri.into(),
            pointed,
            referrer: PublicationKey::ZERO,
            reference_module_data: Bytes::new(),
            collect_module,
            collect_module_init_data: Bytes::new(),
            reference_module: Address::ZERO,
            reference_module_init_data: Bytes::new(),
        }
    }

    /// Claim a referrer publication.
    pub fn referrer(mut self, referrer: PublicationKey) -> Self {
        self.referrer = referrer;
        self
    }

    /// Set the data forwarded to the pointed publication's reference module.
    pub fn reference_module_data(mut self, data: impl Into<Bytes>) -> Self {
        self.reference_module_data = data.into();
        self
    }

    /// Set the collect module init data.
    pub fn collect_init(mut self, data: impl Into<Bytes>) -> Self {
        self.collect_module_init_data = data.into();
        self
    }

    /// Set this publication's own reference module and its init data.
    pub fn reference_module(mut self, module: Address, data: impl Into<Bytes>) -> Self {
        self.reference_module = module;
        self.reference_module_init_data = data.into();
        self
    }
}

/// Which reference publication a [`ReferenceParams`] request creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Comment,
    Quote,
}

impl ReferenceKind {
    pub fn pub_type(self) -> PublicationType {
        match self {
            ReferenceKind::Comment => PublicationType::Comment,
            ReferenceKind::Quote => PublicationType::Quote,
        }
    }
}

/// Parameters of a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorParams {
    pub profile_id: ProfileId,
    pub pointed: PublicationKey,
    pub referrer: PublicationKey,
    pub reference_module_data: Bytes,
}

impl MirrorParams {
    pub fn new(profile_id: ProfileId, pointed: PublicationKey) -> Self {
        Self {
            profile_id,
            pointed,
            referrer: PublicationKey::ZERO,
            reference_module_data: Bytes::new(),
        }
    }

    pub fn referrer(mut self, referrer: PublicationKey) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn reference_module_data(mut self, data: impl Into<Bytes>) -> Self {
        self.reference_module_data = data.into();
        self
    }
}

/// Parameters of a collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectParams {
    pub collector_profile_id: ProfileId,
    pub publication: PublicationKey,
    pub referrer: PublicationKey,
    /// Opaque data forwarded to the publication's collect module.
    pub collect_module_data: Bytes,
}

impl CollectParams {
    pub fn new(collector_profile_id: ProfileId, publication: PublicationKey) -> Self {
        Self {
            collector_profile_id,
            publication,
            referrer: PublicationKey::ZERO,
            collect_module_data: Bytes::new(),
        }
    }

    pub fn referrer(mut self, referrer: PublicationKey) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.collect_module_data = data.into();
        self
    }
}
