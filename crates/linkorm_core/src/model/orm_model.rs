//! Model lookup API.

use super::builder::ModelBuilder;
use crate::metadata::{MetadataError, MetadataRegistry};
use crate::repository::RepositoryRef;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

pub struct Model {
    registry: MetadataRegistry,
    repositories: BTreeMap<String, RepositoryRef>,
}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("entities", &self.registry.entity_names())
            .finish()
    }
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: MetadataRegistry,
        repositories: BTreeMap<String, RepositoryRef>,
    ) -> Self {
        Self {
            registry,
            repositories,
        }
    }

    /// Returns the repository managing `entity` instances.
    pub fn repository(&self, entity: &str) -> Result<RepositoryRef, MetadataError> {
        self.repositories
            .get(entity)
            .cloned()
            .ok_or_else(|| MetadataError::UnknownEntity(entity.to_string()))
    }

    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryRef> {
        self.repositories.values()
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.registry.entity_names()
    }
}
