//! Crate-level error for repository and model operations.

use crate::entity::{EntityId, InvalidStateError};
use crate::metadata::MetadataError;
use crate::repository::MapperError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrmResult<T> = Result<T, OrmError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrmError {
    InvalidState(InvalidStateError),
    Metadata(MetadataError),
    Mapper(MapperError),
    EntityTypeMismatch {
        repository: String,
        entity: String,
    },
    StillReferenced {
        entity: EntityId,
        property: String,
        referrers: usize,
    },
    DanglingReference {
        entity: EntityId,
        property: String,
        target: EntityId,
    },
}

impl Display for OrmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState(err) => write!(f, "{err}"),
            Self::Metadata(err) => write!(f, "{err}"),
            Self::Mapper(err) => write!(f, "{err}"),
            Self::EntityTypeMismatch { repository, entity } => write!(
                f,
                "`{repository}` repository cannot manage `{entity}` entities"
            ),
            Self::StillReferenced {
                entity,
                property,
                referrers,
            } => write!(
                f,
                "entity {entity} is still referenced by {referrers} entities through `{property}`"
            ),
            Self::DanglingReference {
                entity,
                property,
                target,
            } => write!(
                f,
                "entity {entity} references missing entity {target} through `{property}`"
            ),
        }
    }
}

impl Error for OrmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidState(err) => Some(err),
            Self::Metadata(err) => Some(err),
            Self::Mapper(err) => Some(err),
            Self::EntityTypeMismatch { .. }
            | Self::StillReferenced { .. }
            | Self::DanglingReference { .. } => None,
        }
    }
}

impl From<InvalidStateError> for OrmError {
    fn from(value: InvalidStateError) -> Self {
        Self::InvalidState(value)
    }
}

impl From<MetadataError> for OrmError {
    fn from(value: MetadataError) -> Self {
        Self::Metadata(value)
    }
}

impl From<MapperError> for OrmError {
    fn from(value: MapperError) -> Self {
        Self::Mapper(value)
    }
}
