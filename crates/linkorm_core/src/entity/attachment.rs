//! Exclusive owning-repository slot.
//!
//! # Responsibility
//! - Hold the repository an entity is attached to, if any.
//! - Guard writes so an entity never silently changes owner.
//!
//! # Invariants
//! - `claim` succeeds only when the slot is empty or already holds the same
//!   repository instance (pointer identity, not entity-type equality).
//! - `force` and `clear` never fail; they are reserved for hydration and
//!   detachment hooks.

use super::value::EntityId;
use crate::repository::RepositoryRef;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Attachment state violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidStateError {
    NotAttached {
        entity: EntityId,
    },
    AlreadyAttached {
        entity: EntityId,
        current: String,
        requested: String,
    },
    ModelUnavailable {
        repository: String,
    },
}

impl Display for InvalidStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAttached { entity } => {
                write!(f, "entity {entity} is not attached to a repository")
            }
            Self::AlreadyAttached {
                entity,
                current,
                requested,
            } => write!(
                f,
                "entity {entity} is already attached to `{current}` repository; refusing to attach to `{requested}` repository"
            ),
            Self::ModelUnavailable { repository } => {
                write!(f, "repository `{repository}` is not bound to a model")
            }
        }
    }
}

impl Error for InvalidStateError {}

/// Owning-repository cell with a guarded setter.
#[derive(Default, Clone)]
pub struct RepositorySlot {
    repository: Option<RepositoryRef>,
}

impl RepositorySlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.repository.is_some()
    }

    pub fn get(&self) -> Option<&RepositoryRef> {
        self.repository.as_ref()
    }

    /// Returns the owner, failing with `NotAttached` when the slot is empty.
    pub fn require(&self, entity: EntityId) -> Result<&RepositoryRef, InvalidStateError> {
        self.repository
            .as_ref()
            .ok_or(InvalidStateError::NotAttached { entity })
    }

    /// Validating attach: same-owner claims are no-ops, foreign owners fail.
    pub fn claim(
        &mut self,
        entity: EntityId,
        repository: &RepositoryRef,
    ) -> Result<(), InvalidStateError> {
        if let Some(current) = &self.repository {
            if !Rc::ptr_eq(current, repository) {
                return Err(InvalidStateError::AlreadyAttached {
                    entity,
                    current: current.entity_name().to_string(),
                    requested: repository.entity_name().to_string(),
                });
            }
        }

        self.repository = Some(Rc::clone(repository));
        Ok(())
    }

    pub fn force(&mut self, repository: &RepositoryRef) {
        self.repository = Some(Rc::clone(repository));
    }

    pub fn clear(&mut self) -> Option<RepositoryRef> {
        self.repository.take()
    }
}

impl std::fmt::Debug for RepositorySlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.repository {
            Some(repository) => write!(f, "RepositorySlot({})", repository.entity_name()),
            None => write!(f, "RepositorySlot(unattached)"),
        }
    }
}
