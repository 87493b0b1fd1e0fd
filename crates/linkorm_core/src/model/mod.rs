//! Model: the set of repositories sharing one metadata registry.
//!
//! # Responsibility
//! - Validate relationship metadata once, before any entity exists.
//! - Own one repository per registered entity type.
//!
//! # Invariants
//! - Every repository built here is bound to its model through a weak link,
//!   so models and repositories never keep each other alive.

pub mod builder;
pub mod orm_model;

pub use builder::ModelBuilder;
pub use orm_model::Model;
