//! Entity attachment and relationship bookkeeping for an in-memory object
//! graph backed by repositories.

pub mod entity;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod relationships;
pub mod repository;

pub use entity::{
    EntityId, EntityRef, EventArgs, EventRecorder, InvalidStateError, LifecycleEvent,
    LifecycleObserver, LogObserver, Value,
};
pub use error::{OrmError, OrmResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use metadata::{EntityMetadata, MetadataError, MetadataRegistry, PropertyKind};
pub use model::{Model, ModelBuilder};
pub use relationships::{update_relationship, ReferenceCollection, ReferenceHolder};
pub use repository::{
    EntityData, Mapper, MapperError, MapperResult, MemoryMapper, Repository, RepositoryRef,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
