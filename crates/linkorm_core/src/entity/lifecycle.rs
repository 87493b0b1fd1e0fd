//! Ordered lifecycle observer chain.
//!
//! # Responsibility
//! - Deliver entity lifecycle events to registered observers in a fixed order.
//! - Provide built-in observers for diagnostics and tests.
//!
//! # Invariants
//! - Observers run in registration order.
//! - Entity hooks notify the chain before applying their own state change.

use super::value::{EntityId, EventArgs};
use crate::metadata::EntityMetadata;
use crate::repository::{EntityData, RepositoryRef};
use log::debug;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// One lifecycle transition of an entity.
pub enum LifecycleEvent<'a> {
    Load {
        repository: &'a RepositoryRef,
        metadata: &'a EntityMetadata,
        data: &'a EntityData,
    },
    Attach {
        repository: &'a RepositoryRef,
        metadata: &'a EntityMetadata,
    },
    Detach,
    BeforePersist,
    AfterPersist,
    BeforeRemove,
    AfterRemove {
        args: &'a EventArgs,
    },
    Clone {
        source: EntityId,
    },
}

impl LifecycleEvent<'_> {
    /// Stable hook name used in logs and recordings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "on_load",
            Self::Attach { .. } => "on_attach",
            Self::Detach => "on_detach",
            Self::BeforePersist => "on_before_persist",
            Self::AfterPersist => "on_after_persist",
            Self::BeforeRemove => "on_before_remove",
            Self::AfterRemove { .. } => "on_after_remove",
            Self::Clone { .. } => "on_clone",
        }
    }
}

/// Cross-cutting entity behavior notified on every lifecycle transition.
pub trait LifecycleObserver {
    fn on_event(&self, entity: EntityId, event: &LifecycleEvent<'_>);
}

/// Observers shared by an entity and its clones.
#[derive(Clone, Default)]
pub struct ObserverChain {
    observers: Vec<Rc<dyn LifecycleObserver>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Rc<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify(&self, entity: EntityId, event: &LifecycleEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(entity, event);
        }
    }
}

impl Debug for ObserverChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObserverChain({} observers)", self.observers.len())
    }
}

/// Emits one `debug` line per lifecycle event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LifecycleObserver for LogObserver {
    fn on_event(&self, entity: EntityId, event: &LifecycleEvent<'_>) {
        match event {
            LifecycleEvent::Load { repository, .. } | LifecycleEvent::Attach { repository, .. } => {
                debug!(
                    "event=entity_lifecycle module=entity hook={} entity={} repository={}",
                    event.name(),
                    entity,
                    repository.entity_name()
                );
            }
            LifecycleEvent::AfterRemove { args } => debug!(
                "event=entity_lifecycle module=entity hook={} entity={} args={}",
                event.name(),
                entity,
                args.len()
            ),
            _ => debug!(
                "event=entity_lifecycle module=entity hook={} entity={}",
                event.name(),
                entity
            ),
        }
    }
}

/// Records `(entity, hook)` pairs in delivery order.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: RefCell<Vec<(EntityId, &'static str)>>,
}

impl EventRecorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(EntityId, &'static str)> {
        self.events.borrow().clone()
    }

    /// Hook names recorded for one entity.
    pub fn hooks_for(&self, entity: EntityId) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter(|(id, _)| *id == entity)
            .map(|(_, hook)| *hook)
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl LifecycleObserver for EventRecorder {
    fn on_event(&self, entity: EntityId, event: &LifecycleEvent<'_>) {
        self.events.borrow_mut().push((entity, event.name()));
    }
}
