//! Graph validation: pointed publications, referrer claims, root linkage.
//!
//! These are pure functions over a [`PublicationView`]. The engine runs them
//! before writing anything, and modules may call them through their read-only
//! graph view.

use crate::error::HubError;
use crate::publication::{Publication, PublicationType};
use crate::types::{ProfileId, PublicationKey};

/// Read access to the publication graph.
pub trait PublicationView {
    /// The stored record, if any.
    fn publication(&self, key: PublicationKey) -> Option<&Publication>;

    /// Whether a profile has been created.
    fn profile_exists(&self, profile_id: ProfileId) -> bool;

    /// Classified type of a key. Absent records are `Nonexistent`.
    fn publication_type(&self, key: PublicationKey) -> PublicationType {
        self.publication(key)
            .map(Publication::resolved_type)
            .unwrap_or_default()
    }
}

/// Check that `pointed` can be commented on, quoted or mirrored.
///
/// Returns the pointed publication's type on success.
pub fn validate_pointed_pub(
    view: &dyn PublicationView,
    pointed: PublicationKey,
) -> Result<PublicationType, HubError> {
    match view.publication_type(pointed) {
        PublicationType::Nonexistent => Err(HubError::PublicationDoesNotExist),
        PublicationType::Mirror => Err(HubError::InvalidPointedPub),
        other => Ok(other),
    }
}

/// Validate a referrer claim against `target` and classify the referrer.
///
/// - `(0, 0)`: no referral, returns `Nonexistent`.
/// - `(profile, 0)`: unverified profile referral; the profile must exist.
/// - a mirror is valid only if it mirrors `target` exactly.
/// - a comment or quote is valid only if it shares `target`'s thread.
/// - anything else, or `referrer == target`, is `InvalidReferrer`.
pub fn validate_referrer_and_get_referrer_pub_type(
    view: &dyn PublicationView,
    referrer: PublicationKey,
    target: PublicationKey,
) -> Result<PublicationType, HubError> {
    if referrer.is_zero() {
        return Ok(PublicationType::Nonexistent);
    }

    if referrer.pub_id.is_zero() {
        if !view.profile_exists(referrer.profile_id) {
            return Err(HubError::InvalidReferrer);
        }
        return Ok(PublicationType::Nonexistent);
    }

    if referrer == target {
        return Err(HubError::InvalidReferrer);
    }

    let referrer_type = view.publication_type(referrer);
    match referrer_type {
        PublicationType::Mirror => validate_referrer_as_mirror(view, referrer, target)?,
        PublicationType::Comment | PublicationType::Quote => {
            validate_referrer_as_comment_or_quote(view, referrer, target)?
        }
        PublicationType::Post | PublicationType::Nonexistent => {
            return Err(HubError::InvalidReferrer)
        }
    }

    Ok(referrer_type)
}

fn validate_referrer_as_mirror(
    view: &dyn PublicationView,
    referrer: PublicationKey,
    target: PublicationKey,
) -> Result<(), HubError> {
    let mirror = view.publication(referrer).ok_or(HubError::InvalidReferrer)?;
    if mirror.pointed != target {
        return Err(HubError::InvalidReferrer);
    }
    Ok(())
}

fn validate_referrer_as_comment_or_quote(
    view: &dyn PublicationView,
    referrer: PublicationKey,
    target: PublicationKey,
) -> Result<(), HubError> {
    let referrer_root = thread_root(view, referrer);
    if referrer_root.is_zero() || referrer_root != thread_root(view, target) {
        return Err(HubError::InvalidReferrer);
    }
    Ok(())
}

/// Upper bound on `pointed` hops taken through legacy records.
pub const MAX_THREAD_DEPTH: usize = 1024;

/// The post at the top of `key`'s thread, or the zero key if there is none.
///
/// A post is its own root. A comment or quote with a recorded root returns
/// it. Legacy comments carry a zero root, so the walk follows `pointed`
/// until it reaches a post. Mirrors, missing records and chains longer than
/// [`MAX_THREAD_DEPTH`] resolve to zero.
pub fn thread_root(view: &dyn PublicationView, key: PublicationKey) -> PublicationKey {
    let mut current = key;
    for _ in 0..MAX_THREAD_DEPTH {
        let Some(record) = view.publication(current) else {
            return PublicationKey::ZERO;
        };
        match record.resolved_type() {
            PublicationType::Post => return current,
            PublicationType::Comment | PublicationType::Quote if !record.root.is_zero() => {
                return record.root
            }
            PublicationType::Comment | PublicationType::Quote => current = record.pointed,
            PublicationType::Mirror | PublicationType::Nonexistent => {
                return PublicationKey::ZERO
            }
        }
    }
    PublicationKey::ZERO
}

/// Root of a new comment or quote pointing at `pointed`.
///
/// Zero when `pointed` does not lead up to a post.
pub fn compute_root(view: &dyn PublicationView, pointed: PublicationKey) -> PublicationKey {
    thread_root(view, pointed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Default)]
    struct Graph {
        pubs: BTreeMap<PublicationKey, Publication>,
        profiles: BTreeSet<ProfileId>,
    }

    impl PublicationView for Graph {
        fn publication(&self, key: PublicationKey) -> Option<&Publication> {
            self.pubs.get(&key)
        }

        fn profile_exists(&self, profile_id: ProfileId) -> bool {
            self.profiles.contains(&profile_id)
        }
    }

    fn key(p: u64, i: u64) -> PublicationKey {
        PublicationKey::from((p, i))
    }

    fn collectible(mut p: Publication) -> Publication {
        p.collect_module = Address::from_bytes([0xcc; 20]);
        p
    }

    /// P = 1-1 post, C1 = 2-1 comment on P, C2 = 3-1 comment on C1,
    /// M = 4-1 mirror of P, Q = 5-1 quote of P.
    fn thread() -> Graph {
        let mut g = Graph::default();
        g.profiles.extend((1..=5).map(ProfileId));
        g.pubs.insert(key(1, 1), collectible(Publication::post("ipfs://p")));

        let mut c1 = collectible(Publication::reference(PublicationType::Comment, "c1", key(1, 1)));
        c1.root = compute_root(&g, key(1, 1));
        g.pubs.insert(key(2, 1), c1);

        let mut c2 = collectible(Publication::reference(PublicationType::Comment, "c2", key(2, 1)));
        c2.root = compute_root(&g, key(2, 1));
        g.pubs.insert(key(3, 1), c2);

        g.pubs.insert(key(4, 1), Publication::mirror(key(1, 1)));

        let mut q = collectible(Publication::reference(PublicationType::Quote, "q", key(1, 1)));
        q.root = compute_root(&g, key(1, 1));
        g.pubs.insert(key(5, 1), q);
        g
    }

    #[test]
    fn test_root_is_inherited_down_the_thread() {
        let g = thread();
        assert_eq!(g.pubs[&key(2, 1)].root, key(1, 1));
        assert_eq!(g.pubs[&key(3, 1)].root, key(1, 1));
    }

    #[test]
    fn test_no_referrer() {
        let g = thread();
        let t = validate_referrer_and_get_referrer_pub_type(&g, PublicationKey::ZERO, key(1, 1));
        assert_eq!(t, Ok(PublicationType::Nonexistent));
    }

    #[test]
    fn test_profile_only_referrer() {
        let g = thread();
        let ok = validate_referrer_and_get_referrer_pub_type(&g, key(2, 0), key(1, 1));
        assert_eq!(ok, Ok(PublicationType::Nonexistent));
        let missing = validate_referrer_and_get_referrer_pub_type(&g, key(99, 0), key(1, 1));
        assert_eq!(missing, Err(HubError::InvalidReferrer));
    }

    #[test]
    fn test_self_referrer_rejected() {
        let g = thread();
        for target in [key(1, 1), key(2, 1), key(3, 1)] {
            assert_eq!(
                validate_referrer_and_get_referrer_pub_type(&g, target, target),
                Err(HubError::InvalidReferrer)
            );
        }
    }

    #[test]
    fn test_comment_referrer_shares_thread() {
        let g = thread();
        // C1 refers interactions on C2: same root P.
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(2, 1), key(3, 1)),
            Ok(PublicationType::Comment)
        );
        // C2 refers interactions on P directly.
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(3, 1), key(1, 1)),
            Ok(PublicationType::Comment)
        );
        // Quote of P refers interactions on C1.
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(5, 1), key(2, 1)),
            Ok(PublicationType::Quote)
        );
    }

    #[test]
    fn test_mirror_referrer_only_for_its_target() {
        let g = thread();
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(4, 1), key(1, 1)),
            Ok(PublicationType::Mirror)
        );
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(4, 1), key(2, 1)),
            Err(HubError::InvalidReferrer)
        );
    }

    #[test]
    fn test_post_and_missing_referrers_rejected() {
        let mut g = thread();
        g.pubs.insert(key(2, 2), collectible(Publication::post("other")));
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(2, 2), key(1, 1)),
            Err(HubError::InvalidReferrer)
        );
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(2, 9), key(1, 1)),
            Err(HubError::InvalidReferrer)
        );
    }

    #[test]
    fn test_unrelated_thread_referrer_rejected() {
        let mut g = thread();
        g.pubs.insert(key(2, 2), collectible(Publication::post("other")));
        let mut c = collectible(Publication::reference(PublicationType::Comment, "x", key(2, 2)));
        c.root = compute_root(&g, key(2, 2));
        g.pubs.insert(key(3, 2), c);
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(3, 2), key(1, 1)),
            Err(HubError::InvalidReferrer)
        );
    }

    /// P = 1-1 post, L1 = 2-2 legacy comment on P, L2 = 3-2 legacy comment
    /// on L1, O = 6-1 unrelated post, LO = 6-2 legacy comment on O.
    fn with_legacy(mut g: Graph) -> Graph {
        let legacy = |pointed: PublicationKey| Publication {
            pub_type: PublicationType::Nonexistent,
            pointed,
            collect_module: Address::from_bytes([0xcc; 20]),
            ..Publication::default()
        };
        g.profiles.insert(ProfileId(6));
        g.pubs.insert(key(2, 2), legacy(key(1, 1)));
        g.pubs.insert(key(3, 2), legacy(key(2, 2)));
        g.pubs.insert(key(6, 1), collectible(Publication::post("other")));
        g.pubs.insert(key(6, 2), legacy(key(6, 1)));
        g
    }

    #[test]
    fn test_legacy_zero_root_walks_to_the_post() {
        let g = with_legacy(thread());
        assert_eq!(g.pubs[&key(3, 2)].root, PublicationKey::ZERO);
        assert_eq!(thread_root(&g, key(2, 2)), key(1, 1));
        assert_eq!(thread_root(&g, key(3, 2)), key(1, 1));
        assert_eq!(compute_root(&g, key(3, 2)), key(1, 1));
        assert_eq!(compute_root(&g, key(6, 2)), key(6, 1));
    }

    #[test]
    fn test_unresolvable_roots_are_zero() {
        let mut g = thread();
        assert_eq!(thread_root(&g, key(4, 1)), PublicationKey::ZERO);
        assert_eq!(thread_root(&g, key(9, 9)), PublicationKey::ZERO);

        // A legacy comment whose target was never imported.
        let dangling = Publication {
            pointed: key(8, 8),
            collect_module: Address::from_bytes([0xcc; 20]),
            ..Publication::default()
        };
        g.pubs.insert(key(7, 1), dangling);
        assert_eq!(compute_root(&g, key(7, 1)), PublicationKey::ZERO);

        // Two legacy comments pointing at each other never reach a post.
        for (from, to) in [(key(7, 2), key(7, 3)), (key(7, 3), key(7, 2))] {
            let record = Publication {
                pointed: to,
                collect_module: Address::from_bytes([0xcc; 20]),
                ..Publication::default()
            };
            g.pubs.insert(from, record);
        }
        assert_eq!(thread_root(&g, key(7, 2)), PublicationKey::ZERO);
    }

    #[test]
    fn test_legacy_referrer_checked_against_its_own_thread() {
        let g = with_legacy(thread());
        // Same thread: L2 refers interactions on C1 and on P.
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(3, 2), key(2, 1)),
            Ok(PublicationType::Comment)
        );
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(2, 2), key(1, 1)),
            Ok(PublicationType::Comment)
        );
        // Both zero-rooted, different threads.
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(2, 2), key(6, 2)),
            Err(HubError::InvalidReferrer)
        );
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(6, 2), key(3, 2)),
            Err(HubError::InvalidReferrer)
        );
    }

    #[test]
    fn test_rootless_referrer_rejected() {
        let mut g = thread();
        let dangling = |pointed| Publication {
            pointed,
            collect_module: Address::from_bytes([0xcc; 20]),
            ..Publication::default()
        };
        g.pubs.insert(key(7, 1), dangling(key(8, 8)));
        g.pubs.insert(key(7, 2), dangling(key(9, 9)));
        assert_eq!(
            validate_referrer_and_get_referrer_pub_type(&g, key(7, 1), key(7, 2)),
            Err(HubError::InvalidReferrer)
        );
    }

    #[test]
    fn test_pointed_validation() {
        let g = thread();
        assert_eq!(validate_pointed_pub(&g, key(1, 1)), Ok(PublicationType::Post));
        assert_eq!(validate_pointed_pub(&g, key(2, 1)), Ok(PublicationType::Comment));
        assert_eq!(validate_pointed_pub(&g, key(4, 1)), Err(HubError::InvalidPointedPub));
        assert_eq!(
            validate_pointed_pub(&g, key(1, 7)),
            Err(HubError::PublicationDoesNotExist)
        );
    }
}
