//! Repository: attachment authority, identity map and persistence flow.
//!
//! # Responsibility
//! - Attach, detach, persist, remove and load entities of one type.
//! - Hydrate rows through `on_load` and resolve foreign keys via the model.
//!
//! # Invariants
//! - At most one live `EntityRef` per stored id (weak identity map).
//! - `remove` refuses entities owned by another repository or still
//!   referenced, whether the referrer is loaded or only stored.
//! - Entities are accepted only when their metadata equals the repository's.

use super::mapper::{EntityData, Mapper};
use crate::entity::{
    EntityId, EntityRef, EventArgs, InvalidStateError, LifecycleEvent, Value, WeakEntityRef,
};
use crate::error::{OrmError, OrmResult};
use crate::metadata::{EntityMetadata, PropertyKind};
use crate::model::Model;
use log::{debug, error, info};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

pub type RepositoryRef = Rc<Repository>;

/// Collection of persisted entities of one type.
pub struct Repository {
    metadata: Rc<EntityMetadata>,
    mapper: RefCell<Box<dyn Mapper>>,
    identity_map: RefCell<BTreeMap<EntityId, WeakEntityRef>>,
    model: Weak<Model>,
}

impl Debug for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.metadata.name())
            .field("bound", &(self.model.strong_count() > 0))
            .finish()
    }
}

impl Repository {
    /// Creates a standalone repository that is not bound to any model.
    pub fn new(metadata: Rc<EntityMetadata>, mapper: Box<dyn Mapper>) -> RepositoryRef {
        Rc::new(Self::bound(metadata, mapper, Weak::new()))
    }

    pub(crate) fn bound(
        metadata: Rc<EntityMetadata>,
        mapper: Box<dyn Mapper>,
        model: Weak<Model>,
    ) -> Self {
        Self {
            metadata,
            mapper: RefCell::new(mapper),
            identity_map: RefCell::new(BTreeMap::new()),
            model,
        }
    }

    pub fn entity_name(&self) -> &str {
        self.metadata.name()
    }

    pub fn metadata(&self) -> &Rc<EntityMetadata> {
        &self.metadata
    }

    /// Returns the owning model.
    ///
    /// # Errors
    /// - `ModelUnavailable` when `need` is true and no model is bound.
    pub fn get_model(&self, need: bool) -> Result<Option<Rc<Model>>, InvalidStateError> {
        match self.model.upgrade() {
            Some(model) => Ok(Some(model)),
            None if need => Err(InvalidStateError::ModelUnavailable {
                repository: self.entity_name().to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Creates a new entity already attached to this repository.
    pub fn create(self: &Rc<Self>) -> OrmResult<EntityRef> {
        let entity = EntityRef::new(Rc::clone(&self.metadata));
        self.attach(&entity)?;
        Ok(entity)
    }

    /// Attaches `entity`; a no-op when it is already attached here.
    ///
    /// # Errors
    /// - `EntityTypeMismatch` for entities of another type.
    /// - `InvalidState` when the entity belongs to another repository.
    pub fn attach(self: &Rc<Self>, entity: &EntityRef) -> OrmResult<()> {
        self.check_type(entity)?;
        if let Some(current) = entity.get_repository(false)? {
            if Rc::ptr_eq(&current, self) {
                return Ok(());
            }
        }

        entity.on_attach(self, &self.metadata)?;
        debug!(
            "event=entity_attach module=repository status=ok entity={} repository={}",
            entity.id(),
            self.entity_name()
        );
        Ok(())
    }

    /// Detaches `entity` and forgets it in the identity map.
    pub fn detach(self: &Rc<Self>, entity: &EntityRef) -> OrmResult<()> {
        self.ensure_owner(entity)?;
        entity.on_detach();
        self.identity_map.borrow_mut().remove(&entity.id());
        debug!(
            "event=entity_detach module=repository status=ok entity={} repository={}",
            entity.id(),
            self.entity_name()
        );
        Ok(())
    }

    /// Attaches (if needed) and writes `entity` through the mapper.
    pub fn persist(self: &Rc<Self>, entity: &EntityRef) -> OrmResult<()> {
        self.attach(entity)?;
        entity.fire(&LifecycleEvent::BeforePersist);

        let data = entity.to_data();
        if let Err(err) = self.mapper.borrow_mut().persist(&data) {
            error!(
                "event=entity_persist module=repository status=error error_code=mapper_failed entity={} repository={} error={}",
                data.id,
                self.entity_name(),
                err
            );
            return Err(err.into());
        }

        self.identity_map
            .borrow_mut()
            .insert(data.id, entity.downgrade());
        entity.mark_persisted(true);
        entity.fire(&LifecycleEvent::AfterPersist);
        info!(
            "event=entity_persist module=repository status=ok entity={} repository={}",
            data.id,
            self.entity_name()
        );
        Ok(())
    }

    /// Removes `entity` from storage and releases it.
    ///
    /// Referrers are counted both in memory and in storage rows that are not
    /// loaded. Storage is written before the entity's many-has-one links are
    /// cleared, so a mapper failure leaves the graph untouched. The entity ends
    /// unattached and unpersisted.
    pub fn remove(self: &Rc<Self>, entity: &EntityRef) -> OrmResult<()> {
        self.ensure_owner(entity)?;
        let id = entity.id();

        let model = self.get_model(false)?;
        for property in self.metadata.properties() {
            let PropertyKind::OneHasMany { target, inverse } = &property.kind else {
                continue;
            };
            let mut referrers = entity.collection(&property.name)?.len();
            if let Some(model) = &model {
                referrers += model
                    .repository(target)?
                    .unloaded_referrers(inverse, id)?
                    .len();
            }
            if referrers > 0 {
                return Err(OrmError::StillReferenced {
                    entity: id,
                    property: property.name.clone(),
                    referrers,
                });
            }
        }

        entity.fire(&LifecycleEvent::BeforeRemove);
        let was_persisted = entity.is_persisted();
        if was_persisted {
            if let Err(err) = self.mapper.borrow_mut().remove(id) {
                error!(
                    "event=entity_remove module=repository status=error error_code=mapper_failed entity={} repository={} error={}",
                    id,
                    self.entity_name(),
                    err
                );
                return Err(err.into());
            }
        }

        for property in self.metadata.properties() {
            if let PropertyKind::ManyHasOne { .. } = property.kind {
                entity.set_reference(&property.name, None)?;
            }
        }
        self.identity_map.borrow_mut().remove(&id);
        entity.mark_persisted(false);

        let mut args = EventArgs::new();
        args.insert("repository".to_string(), Value::from(self.entity_name()));
        args.insert("was_persisted".to_string(), Value::from(was_persisted));
        entity.on_after_remove(&args);

        info!(
            "event=entity_remove module=repository status=ok entity={} repository={} was_persisted={}",
            id,
            self.entity_name(),
            was_persisted
        );
        Ok(())
    }

    /// Returns the live instance for `id`, loading it from storage if needed.
    pub fn get_by_id(self: &Rc<Self>, id: EntityId) -> OrmResult<Option<EntityRef>> {
        if let Some(entity) = self.cached(id) {
            return Ok(Some(entity));
        }

        let found = self.mapper.borrow().find(id)?;
        match found {
            Some(data) => self.hydrate(data).map(Some),
            None => Ok(None),
        }
    }

    /// Loads every stored row, reusing live instances.
    pub fn find_all(self: &Rc<Self>) -> OrmResult<Vec<EntityRef>> {
        let ids = self.mapper.borrow().ids()?;
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.get_by_id(id)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Number of live instances tracked by the identity map.
    pub fn loaded_count(&self) -> usize {
        self.identity_map
            .borrow()
            .values()
            .filter(|entity| entity.is_alive())
            .count()
    }

    /// Stored rows whose `property` key points at `target` and that have no
    /// live instance. Live referrers are tracked by inverse collections.
    fn unloaded_referrers(&self, property: &str, target: EntityId) -> OrmResult<Vec<EntityId>> {
        let ids = self.mapper.borrow().ids()?;
        let mut referrers = Vec::new();
        for id in ids {
            if self.cached(id).is_some() {
                continue;
            }
            let Some(row) = self.mapper.borrow().find(id)? else {
                continue;
            };
            if row.references.get(property) == Some(&Some(target)) {
                referrers.push(id);
            }
        }
        Ok(referrers)
    }

    fn cached(&self, id: EntityId) -> Option<EntityRef> {
        let mut identity_map = self.identity_map.borrow_mut();
        let entity = identity_map.get(&id)?.upgrade();
        if entity.is_none() {
            identity_map.remove(&id);
        }
        entity
    }

    fn hydrate(self: &Rc<Self>, data: EntityData) -> OrmResult<EntityRef> {
        let entity = EntityRef::from_data(Rc::clone(&self.metadata), &data)?;
        // Registered before references resolve so cycles find this instance.
        self.identity_map
            .borrow_mut()
            .insert(data.id, entity.downgrade());
        entity.on_load(self, &self.metadata, &data);
        entity.mark_persisted(true);

        for (property, target_id) in &data.references {
            let Some(target_id) = target_id else {
                continue;
            };
            let target = self.resolve_reference(data.id, property, *target_id)?;
            entity.set_reference(property, Some(&target))?;
        }

        debug!(
            "event=entity_load module=repository status=ok entity={} repository={}",
            data.id,
            self.entity_name()
        );
        Ok(entity)
    }

    fn resolve_reference(
        &self,
        entity: EntityId,
        property: &str,
        target: EntityId,
    ) -> OrmResult<EntityRef> {
        let meta = self.metadata.require_property(property)?;
        let PropertyKind::ManyHasOne {
            target: target_entity,
            ..
        } = &meta.kind
        else {
            return Err(meta.unexpected_kind("many-has-one").into());
        };

        let model = self
            .get_model(true)?
            .ok_or_else(|| InvalidStateError::ModelUnavailable {
                repository: self.entity_name().to_string(),
            })?;
        model
            .repository(target_entity)?
            .get_by_id(target)?
            .ok_or_else(|| OrmError::DanglingReference {
                entity,
                property: property.to_string(),
                target,
            })
    }

    fn check_type(&self, entity: &EntityRef) -> OrmResult<()> {
        let metadata = entity.metadata();
        if Rc::ptr_eq(&metadata, &self.metadata) || *metadata == *self.metadata {
            return Ok(());
        }
        Err(OrmError::EntityTypeMismatch {
            repository: self.entity_name().to_string(),
            entity: metadata.name().to_string(),
        })
    }

    fn ensure_owner(self: &Rc<Self>, entity: &EntityRef) -> OrmResult<()> {
        let current = entity
            .get_repository(false)?
            .ok_or(InvalidStateError::NotAttached { entity: entity.id() })?;
        if Rc::ptr_eq(&current, self) {
            return Ok(());
        }
        Err(InvalidStateError::AlreadyAttached {
            entity: entity.id(),
            current: current.entity_name().to_string(),
            requested: self.entity_name().to_string(),
        }
        .into())
    }
}
