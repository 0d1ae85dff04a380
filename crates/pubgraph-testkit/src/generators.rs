//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pubgraph_core::{
    Address, HubError, ProfileId, PubId, Publication, PublicationKey, PublicationType,
};

use crate::fixtures::{Actor, TestWorld};

/// Generate a random non-zero address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>()
        .prop_filter("non-zero", |bytes| bytes.iter().any(|b| *b != 0))
        .prop_map(Address)
}

/// Generate a content URI.
pub fn content_uri() -> impl Strategy<Value = String> {
    "ipfs://[a-z0-9]{1,46}".prop_map(String::from)
}

/// Generate a non-zero publication key with small ids.
pub fn publication_key() -> impl Strategy<Value = PublicationKey> {
    (1u64..=64, 1u64..=64).prop_map(|(p, i)| PublicationKey::new(ProfileId(p), PubId(i)))
}

/// Generate a stored type tag.
pub fn publication_type() -> impl Strategy<Value = PublicationType> {
    prop_oneof![
        Just(PublicationType::Nonexistent),
        Just(PublicationType::Post),
        Just(PublicationType::Comment),
        Just(PublicationType::Mirror),
        Just(PublicationType::Quote),
    ]
}

/// Generate an untagged record as written before explicit tagging.
///
/// The pointed publication and the collect module are each zero about
/// half the time, covering every row of the inference table.
pub fn legacy_record() -> impl Strategy<Value = Publication> {
    (
        content_uri(),
        prop::option::of(publication_key()),
        prop::option::of(address()),
        prop::option::of(address()),
    )
        .prop_map(|(content_uri, pointed, collect, reference)| Publication {
            pub_type: PublicationType::Nonexistent,
            content_uri,
            pointed: pointed.unwrap_or(PublicationKey::ZERO),
            root: PublicationKey::ZERO,
            collect_module: collect.unwrap_or(Address::ZERO),
            reference_module: reference.unwrap_or(Address::ZERO),
        })
}

/// What one step of a [`ThreadPlan`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Post,
    Comment,
    Quote,
    Mirror,
}

/// One publication to create.
///
/// `author` and `target` are reduced modulo the number of actors and of
/// pointable publications when the plan runs.
#[derive(Debug, Clone, Copy)]
pub struct ThreadStep {
    pub author: usize,
    pub target: usize,
    pub kind: StepKind,
}

/// A publication created by [`ThreadPlan::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    pub key: PublicationKey,
    pub kind: StepKind,
    /// Zero for posts.
    pub pointed: PublicationKey,
}

/// A random sequence of posts, comments, quotes and mirrors.
///
/// The first step is always a post so every later step has something to
/// point at. Steps only ever point at posts, comments and quotes.
#[derive(Debug, Clone)]
pub struct ThreadPlan {
    pub actors: usize,
    pub steps: Vec<ThreadStep>,
}

impl ThreadPlan {
    /// Execute the plan, creating the actors first.
    pub fn run(&self, world: &mut TestWorld) -> Result<(Vec<Actor>, Vec<Created>), HubError> {
        let actors = world.actors(self.actors.max(1))?;
        let mut created: Vec<Created> = Vec::with_capacity(self.steps.len());
        let mut pointable: Vec<PublicationKey> = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            let author = actors[step.author % actors.len()];
            let kind = if i == 0 || pointable.is_empty() {
                StepKind::Post
            } else {
                step.kind
            };
            let pointed = match kind {
                StepKind::Post => PublicationKey::ZERO,
                _ => pointable[step.target % pointable.len()],
            };
            let key = match kind {
                StepKind::Post => world.post(author)?,
                StepKind::Comment => world.comment(author, pointed)?,
                StepKind::Quote => world.quote(author, pointed)?,
                StepKind::Mirror => world.mirror(author, pointed)?,
            };
            if kind != StepKind::Mirror {
                pointable.push(key);
            }
            created.push(Created { key, kind, pointed });
        }
        Ok((actors, created))
    }
}

fn step_kind() -> impl Strategy<Value = StepKind> {
    prop_oneof![
        1 => Just(StepKind::Post),
        3 => Just(StepKind::Comment),
        2 => Just(StepKind::Quote),
        2 => Just(StepKind::Mirror),
    ]
}

impl Arbitrary for ThreadPlan {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            1usize..=4,
            prop::collection::vec((any::<usize>(), any::<usize>(), step_kind()), 1..24),
        )
            .prop_map(|(actors, steps)| ThreadPlan {
                actors,
                steps: steps
                    .into_iter()
                    .map(|(author, target, kind)| ThreadStep {
                        author,
                        target,
                        kind,
                    })
                    .collect(),
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_legacy_records_are_untagged(record in legacy_record()) {
            prop_assert!(record.is_legacy());
            prop_assert!(record.root.is_zero());
        }

        #[test]
        fn test_plans_run_cleanly(plan: ThreadPlan) {
            let mut world = TestWorld::new().unwrap();
            let (_, created) = plan.run(&mut world).unwrap();
            prop_assert_eq!(created.len(), plan.steps.len());
            prop_assert_eq!(created[0].kind, StepKind::Post);
        }
    }
}
