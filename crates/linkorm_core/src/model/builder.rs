//! Model construction and startup validation.

use super::orm_model::Model;
use crate::metadata::{EntityMetadata, MetadataError, MetadataRegistry};
use crate::repository::{Mapper, MemoryMapper, Repository};
use log::{error, info};
use std::rc::Rc;

/// Collects entity declarations and builds a validated [`Model`].
#[derive(Default)]
pub struct ModelBuilder {
    entries: Vec<(EntityMetadata, Option<Box<dyn Mapper>>)>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity backed by a fresh `MemoryMapper`.
    pub fn entity(mut self, metadata: EntityMetadata) -> Self {
        self.entries.push((metadata, None));
        self
    }

    pub fn entity_with_mapper(mut self, metadata: EntityMetadata, mapper: Box<dyn Mapper>) -> Self {
        self.entries.push((metadata, Some(mapper)));
        self
    }

    /// Validates all metadata and wires one repository per entity.
    ///
    /// # Errors
    /// - Any per-entity `MetadataError` (names, duplicates).
    /// - `InverseMismatch` for relationships without a matching inverse.
    pub fn build(self) -> Result<Rc<Model>, MetadataError> {
        match self.try_build() {
            Ok(model) => {
                info!(
                    "event=model_build module=model status=ok entities={}",
                    model.entity_names().join(",")
                );
                Ok(model)
            }
            Err(err) => {
                error!(
                    "event=model_build module=model status=error error_code=invalid_metadata error={}",
                    err
                );
                Err(err)
            }
        }
    }

    fn try_build(self) -> Result<Rc<Model>, MetadataError> {
        let mut registry = MetadataRegistry::new();
        let mut wiring = Vec::with_capacity(self.entries.len());
        for (metadata, mapper) in self.entries {
            let metadata = registry.register(metadata)?;
            let mapper: Box<dyn Mapper> = match mapper {
                Some(mapper) => mapper,
                None => Box::new(MemoryMapper::new()),
            };
            wiring.push((metadata, mapper));
        }
        registry.validate_relationships()?;

        Ok(Rc::new_cyclic(|model| {
            let repositories = wiring
                .into_iter()
                .map(|(metadata, mapper)| {
                    let name = metadata.name().to_string();
                    (
                        name,
                        Rc::new(Repository::bound(metadata, mapper, model.clone())),
                    )
                })
                .collect();
            Model::from_parts(registry, repositories)
        }))
    }
}
