//! Entity instances and shared handles.
//!
//! # Responsibility
//! - Hold scalar values, relationship endpoints and the owning repository.
//! - Expose attachment lifecycle hooks (`on_load`, `on_attach`, `on_detach`,
//!   `on_after_remove`) and clone semantics.
//!
//! # Invariants
//! - An entity is attached to at most one repository at a time.
//! - Every hook notifies the observer chain before mutating the slot.
//! - Many-has-one changes always go through `set_reference`, which keeps the
//!   inverse collections in sync.

use super::attachment::{InvalidStateError, RepositorySlot};
use super::lifecycle::{LifecycleEvent, LifecycleObserver, ObserverChain};
use super::value::{EntityId, EventArgs, Value};
use crate::error::OrmResult;
use crate::metadata::{EntityMetadata, MetadataError, PropertyKind, PropertyMetadata};
use crate::model::Model;
use crate::relationships::{
    update_relationship, ManyHasOne, OneHasMany, ReferenceCollection, ReferenceHolder,
};
use crate::repository::{EntityData, RepositoryRef};
use log::warn;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Entity state behind an [`EntityRef`].
struct Entity {
    id: EntityId,
    metadata: Rc<EntityMetadata>,
    values: BTreeMap<String, Value>,
    references: BTreeMap<String, ManyHasOne>,
    collections: BTreeMap<String, OneHasMany>,
    repository: RepositorySlot,
    observers: ObserverChain,
    persisted: bool,
}

impl Entity {
    fn blank(id: EntityId, metadata: Rc<EntityMetadata>) -> Self {
        let mut values = BTreeMap::new();
        let mut references = BTreeMap::new();
        let mut collections = BTreeMap::new();

        for property in metadata.properties() {
            match property.kind {
                PropertyKind::Scalar => {
                    values.insert(property.name.clone(), Value::Null);
                }
                PropertyKind::ManyHasOne { .. } => {
                    references.insert(property.name.clone(), ManyHasOne::new(property.clone()));
                }
                PropertyKind::OneHasMany { .. } => {
                    collections.insert(property.name.clone(), OneHasMany::new(property.clone()));
                }
            }
        }

        Self {
            id,
            metadata,
            values,
            references,
            collections,
            repository: RepositorySlot::empty(),
            observers: ObserverChain::new(),
            persisted: false,
        }
    }

    fn kind_error(&self, property: &str, expected: &'static str) -> MetadataError {
        match self.metadata.require_property(property) {
            Ok(meta) => meta.unexpected_kind(expected),
            Err(err) => err,
        }
    }
}

/// Shared, single-threaded handle to one entity.
///
/// Cloning the handle shares the same entity; use [`EntityRef::duplicate`]
/// for a new entity with copied state.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<Entity>>);

/// Non-owning handle used by inverse collections and the identity map.
#[derive(Clone)]
pub struct WeakEntityRef(Weak<RefCell<Entity>>);

impl WeakEntityRef {
    pub fn upgrade(&self) -> Option<EntityRef> {
        self.0.upgrade().map(EntityRef)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Pointer identity against a live handle; never borrows either entity.
    pub fn points_to(&self, entity: &EntityRef) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&entity.0))
    }
}

impl Debug for WeakEntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(entity) => write!(f, "Weak({entity:?})"),
            None => write!(f, "Weak(dropped)"),
        }
    }
}

impl Debug for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => write!(f, "EntityRef({}#{})", entity.metadata.name(), entity.id),
            Err(_) => write!(f, "EntityRef(<borrowed>)"),
        }
    }
}

impl EntityRef {
    /// Creates a fresh, unattached entity with a generated id.
    pub fn new(metadata: Rc<EntityMetadata>) -> Self {
        Self::with_id(Uuid::new_v4(), metadata)
    }

    /// Creates a fresh, unattached entity with a caller-provided id.
    pub fn with_id(id: EntityId, metadata: Rc<EntityMetadata>) -> Self {
        Self(Rc::new(RefCell::new(Entity::blank(id, metadata))))
    }

    /// Rebuilds scalar state from a storage row. References are resolved by
    /// the repository afterwards.
    pub(crate) fn from_data(
        metadata: Rc<EntityMetadata>,
        data: &EntityData,
    ) -> Result<Self, MetadataError> {
        let entity = Self::with_id(data.id, metadata);
        for (property, value) in &data.values {
            entity.set(property, value.clone())?;
        }
        Ok(entity)
    }

    pub fn id(&self) -> EntityId {
        self.0.borrow().id
    }

    pub fn entity_name(&self) -> String {
        self.0.borrow().metadata.name().to_string()
    }

    pub fn metadata(&self) -> Rc<EntityMetadata> {
        Rc::clone(&self.0.borrow().metadata)
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakEntityRef {
        WeakEntityRef(Rc::downgrade(&self.0))
    }

    /// Whether the current state has been written through a repository.
    pub fn is_persisted(&self) -> bool {
        self.0.borrow().persisted
    }

    pub(crate) fn mark_persisted(&self, persisted: bool) {
        self.0.borrow_mut().persisted = persisted;
    }

    /// Appends an observer to this entity's lifecycle chain.
    pub fn observe(&self, observer: Rc<dyn LifecycleObserver>) {
        self.0.borrow_mut().observers.register(observer);
    }

    /// Reads a scalar property; unset scalars read as `Value::Null`.
    pub fn get(&self, property: &str) -> Result<Value, MetadataError> {
        let entity = self.0.borrow();
        entity
            .values
            .get(property)
            .cloned()
            .ok_or_else(|| entity.kind_error(property, "scalar"))
    }

    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<(), MetadataError> {
        let mut entity = self.0.borrow_mut();
        if let Some(slot) = entity.values.get_mut(property) {
            *slot = value.into();
            return Ok(());
        }
        Err(entity.kind_error(property, "scalar"))
    }

    /// Returns the owning repository.
    ///
    /// # Errors
    /// - `NotAttached` when `need` is true and the entity is unattached.
    pub fn get_repository(&self, need: bool) -> Result<Option<RepositoryRef>, InvalidStateError> {
        let entity = self.0.borrow();
        if need {
            return entity.repository.require(entity.id).map(|r| Some(Rc::clone(r)));
        }
        Ok(entity.repository.get().cloned())
    }

    /// Returns the model of the owning repository, forwarding `need` to both
    /// lookups.
    pub fn get_model(&self, need: bool) -> Result<Option<Rc<Model>>, InvalidStateError> {
        match self.get_repository(need)? {
            Some(repository) => repository.get_model(need),
            None => Ok(None),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.0.borrow().repository.is_set()
    }

    /// Hydration hook: takes ownership without the single-owner check.
    pub fn on_load(
        &self,
        repository: &RepositoryRef,
        metadata: &EntityMetadata,
        data: &EntityData,
    ) {
        self.fire(&LifecycleEvent::Load {
            repository,
            metadata,
            data,
        });
        self.0.borrow_mut().repository.force(repository);
    }

    /// Explicit attach hook; validates single ownership.
    pub fn on_attach(
        &self,
        repository: &RepositoryRef,
        metadata: &EntityMetadata,
    ) -> Result<(), InvalidStateError> {
        self.fire(&LifecycleEvent::Attach {
            repository,
            metadata,
        });
        self.attach(repository)
    }

    pub fn on_detach(&self) {
        self.fire(&LifecycleEvent::Detach);
        self.0.borrow_mut().repository.clear();
    }

    /// Post-removal hook; `args` is forwarded to observers untouched.
    pub fn on_after_remove(&self, args: &EventArgs) {
        self.fire(&LifecycleEvent::AfterRemove { args });
        self.0.borrow_mut().repository.clear();
    }

    fn attach(&self, repository: &RepositoryRef) -> Result<(), InvalidStateError> {
        let mut entity = self.0.borrow_mut();
        let id = entity.id;
        entity.repository.claim(id, repository).map_err(|err| {
            warn!(
                "event=entity_attach module=entity status=error error_code=already_attached entity={} requested={}",
                id,
                repository.entity_name()
            );
            err
        })
    }

    pub(crate) fn fire(&self, event: &LifecycleEvent<'_>) {
        let (id, observers) = {
            let entity = self.0.borrow();
            (entity.id, entity.observers.clone())
        };
        observers.notify(id, event);
    }

    /// Creates a copy with a new id.
    ///
    /// Scalars and many-has-one targets are copied (the clone joins each
    /// target's inverse collection); inverse collections start empty. A clone
    /// of an attached entity asks the same repository to attach it again.
    pub fn duplicate(&self) -> OrmResult<EntityRef> {
        let (source_id, metadata, values, targets, repository, observers) = {
            let entity = self.0.borrow();
            let targets: Vec<(String, EntityRef)> = entity
                .references
                .iter()
                .filter_map(|(name, holder)| holder.target().map(|t| (name.clone(), t.clone())))
                .collect();
            (
                entity.id,
                Rc::clone(&entity.metadata),
                entity.values.clone(),
                targets,
                entity.repository.clone(),
                entity.observers.clone(),
            )
        };

        let clone = EntityRef::new(metadata);
        {
            let mut entity = clone.0.borrow_mut();
            entity.values = values;
            entity.repository = repository;
            entity.observers = observers;
        }
        for (property, target) in &targets {
            clone.set_reference(property, Some(target))?;
        }

        clone.on_clone(source_id)?;
        Ok(clone)
    }

    fn on_clone(&self, source: EntityId) -> OrmResult<()> {
        self.fire(&LifecycleEvent::Clone { source });
        let repository = self.0.borrow_mut().repository.clear();
        if let Some(repository) = repository {
            repository.attach(self)?;
        }
        Ok(())
    }

    fn property_metadata(&self, property: &str) -> Result<PropertyMetadata, MetadataError> {
        self.0.borrow().metadata.require_property(property).cloned()
    }

    /// Current target of a many-has-one property.
    pub fn reference(&self, property: &str) -> Result<Option<EntityRef>, MetadataError> {
        let entity = self.0.borrow();
        match entity.references.get(property) {
            Some(holder) => Ok(holder.target().cloned()),
            None => Err(entity.kind_error(property, "many-has-one")),
        }
    }

    /// Points a many-has-one property at `target` and moves this entity between
    /// the old and new targets' inverse collections.
    pub fn set_reference(
        &self,
        property: &str,
        target: Option<&EntityRef>,
    ) -> Result<(), MetadataError> {
        let meta = self.property_metadata(property)?;
        let PropertyKind::ManyHasOne {
            target: expected,
            inverse,
        } = &meta.kind
        else {
            return Err(meta.unexpected_kind("many-has-one"));
        };

        if let Some(target) = target {
            let target_meta = target.metadata();
            if target_meta.name() != expected {
                return Err(MetadataError::TargetMismatch {
                    entity: meta.entity.clone(),
                    property: meta.name.clone(),
                    expected: expected.clone(),
                    actual: target_meta.name().to_string(),
                });
            }
            target_meta.require_property(inverse)?.inverse_reference()?;
        }

        let old = {
            let mut entity = self.0.borrow_mut();
            match entity.references.get_mut(property) {
                Some(holder) => holder.replace(target.cloned()),
                None => return Err(meta.unexpected_kind("many-has-one")),
            }
        };

        if let (Some(old), Some(new)) = (&old, target) {
            if old.ptr_eq(new) {
                return Ok(());
            }
        }
        update_relationship(self, &meta, old.as_ref(), target)
    }

    /// Live members of a one-has-many collection.
    pub fn collection(&self, property: &str) -> Result<Vec<EntityRef>, MetadataError> {
        let entity = self.0.borrow();
        match entity.collections.get(property) {
            Some(collection) => Ok(collection.members()),
            None => Err(entity.kind_error(property, "one-has-many")),
        }
    }

    pub fn collection_contains(
        &self,
        property: &str,
        referrer: &EntityRef,
    ) -> Result<bool, MetadataError> {
        let entity = self.0.borrow();
        match entity.collections.get(property) {
            Some(collection) => Ok(collection.contains(referrer)),
            None => Err(entity.kind_error(property, "one-has-many")),
        }
    }

    /// Adds `referrer` by pointing its inverse reference at this entity.
    pub fn add_to_collection(
        &self,
        property: &str,
        referrer: &EntityRef,
    ) -> Result<(), MetadataError> {
        let meta = self.property_metadata(property)?;
        referrer.set_reference(meta.inverse_reference()?, Some(self))
    }

    /// Removes `referrer` by clearing its inverse reference, if it points here.
    pub fn remove_from_collection(
        &self,
        property: &str,
        referrer: &EntityRef,
    ) -> Result<(), MetadataError> {
        let meta = self.property_metadata(property)?;
        let inverse = meta.inverse_reference()?;
        match referrer.reference(inverse)? {
            Some(current) if current.ptr_eq(self) => referrer.set_reference(inverse, None),
            _ => Ok(()),
        }
    }

    pub(crate) fn with_collection_mut<R>(
        &self,
        property: &str,
        apply: impl FnOnce(&mut OneHasMany) -> R,
    ) -> Result<R, MetadataError> {
        let mut entity = self.0.borrow_mut();
        if let Some(collection) = entity.collections.get_mut(property) {
            return Ok(apply(collection));
        }
        Err(entity.kind_error(property, "one-has-many"))
    }

    /// Storage snapshot: scalars plus many-has-one foreign keys.
    pub fn to_data(&self) -> EntityData {
        let entity = self.0.borrow();
        EntityData {
            id: entity.id,
            values: entity.values.clone(),
            references: entity
                .references
                .iter()
                .map(|(name, holder)| (name.clone(), holder.target().map(EntityRef::id)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EntityRef;
    use crate::entity::value::Value;
    use crate::metadata::{EntityMetadata, MetadataError};
    use std::rc::Rc;

    fn category() -> Rc<EntityMetadata> {
        Rc::new(
            EntityMetadata::new("Category")
                .scalar("name")
                .many_has_one("parent", "Category", "children")
                .one_has_many("children", "Category", "parent"),
        )
    }

    #[test]
    fn fresh_entity_is_unattached_with_null_scalars() {
        let entity = EntityRef::new(category());
        assert!(!entity.is_attached());
        assert!(!entity.is_persisted());
        assert_eq!(entity.get("name").expect("name"), Value::Null);
        assert!(entity.get_repository(false).expect("optional lookup").is_none());
        assert!(entity.get_model(false).expect("optional lookup").is_none());
    }

    #[test]
    fn scalar_access_rejects_relationship_properties() {
        let entity = EntityRef::new(category());
        entity.set("name", "root").expect("scalar set");
        assert_eq!(entity.get("name").expect("name").as_text(), Some("root"));

        let err = entity.set("parent", 1_i64).expect_err("reference is not scalar");
        assert!(matches!(err, MetadataError::UnexpectedKind { .. }));
        let err = entity.get("missing").expect_err("unknown property");
        assert!(matches!(err, MetadataError::UnknownProperty { .. }));
    }

    #[test]
    fn self_referencing_relationship_keeps_both_sides() {
        let meta = category();
        let root = EntityRef::new(Rc::clone(&meta));
        let child = EntityRef::new(meta);

        child.set_reference("parent", Some(&root)).expect("link child");
        assert!(root.collection_contains("children", &child).expect("children"));

        root.set_reference("parent", Some(&root)).expect("self link");
        assert!(root.collection_contains("children", &root).expect("children"));
        assert_eq!(root.collection("children").expect("children").len(), 2);

        root.set_reference("parent", None).expect("unlink self");
        assert!(!root.collection_contains("children", &root).expect("children"));
    }

    #[test]
    fn self_reference_holds_entity_until_cleared() {
        let root = EntityRef::new(category());
        root.set_reference("parent", Some(&root)).expect("self link");
        let weak = root.downgrade();

        drop(root);
        let root = weak.upgrade().expect("self link keeps the entity alive");
        root.set_reference("parent", None).expect("unlink self");
        drop(root);
        assert!(!weak.is_alive());
    }

    #[test]
    fn to_data_captures_foreign_keys() {
        let meta = category();
        let root = EntityRef::new(Rc::clone(&meta));
        let child = EntityRef::new(meta);
        child.set("name", "leaf").expect("scalar set");
        child.set_reference("parent", Some(&root)).expect("link");

        let data = child.to_data();
        assert_eq!(data.id, child.id());
        assert_eq!(data.values.get("name"), Some(&Value::from("leaf")));
        assert_eq!(data.references.get("parent"), Some(&Some(root.id())));
    }
}
