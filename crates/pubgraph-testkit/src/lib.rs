//! # pubgraph testkit
//!
//! Testing utilities for pubgraph.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a registry of every built-in and mock module at fixed
//!   addresses, a matching whitelist config, and [`TestWorld`] for driving a
//!   synchronous engine
//! - **Mocks**: modules that veto after writing, implement only the legacy
//!   interface, or implement nothing at all
//! - **Generators**: proptest strategies for records and random threads
//!
//! ## Test Fixtures
//!
//! ```rust
//! use pubgraph_testkit::fixtures::TestWorld;
//!
//! let mut world = TestWorld::new().unwrap();
//! let alice = world.actor().unwrap();
//! let bob = world.actor().unwrap();
//! let post = world.post(alice).unwrap();
//! let comment = world.comment(bob, post).unwrap();
//! assert_eq!(world.engine.publication(comment).root, post);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pubgraph_testkit::{ThreadPlan, TestWorld};
//!
//! proptest! {
//!     #[test]
//!     fn ids_are_dense(plan: ThreadPlan) {
//!         let mut world = TestWorld::new().unwrap();
//!         let (actors, created) = plan.run(&mut world).unwrap();
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{
    addresses, random_address, standard_config, standard_hub, standard_registry, Actor,
    TestClock, TestWorld,
};
pub use generators::{Created, StepKind, ThreadPlan, ThreadStep};
