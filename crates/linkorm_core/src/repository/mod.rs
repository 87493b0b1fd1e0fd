//! Repository layer and storage seam.
//!
//! # Responsibility
//! - Own attachment of entities to a persistence-backed collection.
//! - Isolate row storage behind the `Mapper` trait.

pub mod entity_repository;
pub mod mapper;

pub use entity_repository::{Repository, RepositoryRef};
pub use mapper::{EntityData, Mapper, MapperError, MapperResult, MemoryMapper};
