//! Cross-entity metadata registry.

use super::{EntityMetadata, MetadataError, PropertyKind, PropertyMetadata};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Registered entity metadata, keyed by entity name.
#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    entities: BTreeMap<String, Rc<EntityMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity after per-entity validation.
    pub fn register(
        &mut self,
        metadata: EntityMetadata,
    ) -> Result<Rc<EntityMetadata>, MetadataError> {
        metadata.validate()?;
        let name = metadata.name().to_string();
        if self.entities.contains_key(name.as_str()) {
            return Err(MetadataError::DuplicateEntity(name));
        }

        let metadata = Rc::new(metadata);
        self.entities.insert(name, Rc::clone(&metadata));
        Ok(metadata)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rc<EntityMetadata>> {
        self.entities.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Rc<EntityMetadata>, MetadataError> {
        self.get(name)
            .ok_or_else(|| MetadataError::UnknownEntity(name.to_string()))
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<EntityMetadata>> {
        self.entities.values()
    }

    /// Checks that every relationship is paired with a matching inverse.
    ///
    /// # Invariants
    /// - `A.x: many_has_one(B, y)` requires `B.y: one_has_many(A, x)`.
    /// - `B.y: one_has_many(A, x)` requires `A.x: many_has_one(B, y)`.
    pub fn validate_relationships(&self) -> Result<(), MetadataError> {
        for entity in self.entities.values() {
            for property in entity.properties() {
                let expected = match &property.kind {
                    PropertyKind::Scalar => continue,
                    PropertyKind::ManyHasOne { .. } => "one-has-many",
                    PropertyKind::OneHasMany { .. } => "many-has-one",
                };
                self.check_inverse(property, expected)?;
            }
        }
        Ok(())
    }

    fn check_inverse(
        &self,
        property: &PropertyMetadata,
        expected: &'static str,
    ) -> Result<(), MetadataError> {
        let Some((target, inverse)) = property.relationship() else {
            return Ok(());
        };
        let mismatch = |message: String| MetadataError::InverseMismatch {
            entity: property.entity.clone(),
            property: property.name.clone(),
            message,
        };

        let target_meta = self
            .get(target)
            .ok_or_else(|| mismatch(format!("target entity `{target}` is not registered")))?;
        let inverse_meta = target_meta
            .property(inverse)
            .ok_or_else(|| mismatch(format!("`{target}.{inverse}` does not exist")))?;

        if inverse_meta.kind.label() != expected {
            return Err(mismatch(format!(
                "`{target}.{inverse}` is {} instead of {expected}",
                inverse_meta.kind.label()
            )));
        }

        match inverse_meta.relationship() {
            Some((back_target, back_inverse))
                if back_target == property.entity && back_inverse == property.name =>
            {
                Ok(())
            }
            _ => Err(mismatch(format!(
                "`{target}.{inverse}` does not point back to `{}.{}`",
                property.entity, property.name
            ))),
        }
    }
}
