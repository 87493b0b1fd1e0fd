//! Relationship endpoints and inverse-collection maintenance.
//!
//! # Responsibility
//! - Model the many-has-one side as a reference holder and the one-has-many
//!   side as a reference collection.
//! - Keep both sides in sync whenever a many-has-one reference changes.
//!
//! # Invariants
//! - Collections are only mutated through `update_relationship`.
//! - `add`/`remove` on a collection are idempotent.

pub mod many_has_one;
pub mod one_has_many;

pub use many_has_one::{update_relationship, ManyHasOne, ReferenceHolder};
pub use one_has_many::{OneHasMany, ReferenceCollection};
