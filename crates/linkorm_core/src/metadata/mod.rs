//! Entity and relationship metadata.
//!
//! # Responsibility
//! - Describe entity types, their scalar properties and relationship pairs.
//! - Reject misconfigured relationships before any entity is created.
//!
//! # Invariants
//! - Every `many_has_one` property names an inverse `one_has_many` property on
//!   its target type, and that inverse points back at the same pair.
//! - Entity and property names match `^[A-Za-z_][A-Za-z0-9_]*$`.

pub mod entity_metadata;
pub mod registry;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use entity_metadata::{EntityMetadata, PropertyKind, PropertyMetadata};
pub use registry::MetadataRegistry;

/// Configuration errors raised while declaring or resolving metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    InvalidEntityName(String),
    InvalidPropertyName {
        entity: String,
        property: String,
    },
    DuplicateProperty {
        entity: String,
        property: String,
    },
    DuplicateEntity(String),
    UnknownEntity(String),
    UnknownProperty {
        entity: String,
        property: String,
    },
    UnexpectedKind {
        entity: String,
        property: String,
        expected: &'static str,
    },
    InverseMismatch {
        entity: String,
        property: String,
        message: String,
    },
    TargetMismatch {
        entity: String,
        property: String,
        expected: String,
        actual: String,
    },
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntityName(name) => write!(f, "invalid entity name `{name}`"),
            Self::InvalidPropertyName { entity, property } => {
                write!(f, "invalid property name `{property}` on entity `{entity}`")
            }
            Self::DuplicateProperty { entity, property } => {
                write!(f, "property `{entity}.{property}` is declared twice")
            }
            Self::DuplicateEntity(name) => write!(f, "entity `{name}` is already registered"),
            Self::UnknownEntity(name) => write!(f, "unknown entity `{name}`"),
            Self::UnknownProperty { entity, property } => {
                write!(f, "unknown property `{entity}.{property}`")
            }
            Self::UnexpectedKind {
                entity,
                property,
                expected,
            } => write!(f, "property `{entity}.{property}` is not a {expected} property"),
            Self::InverseMismatch {
                entity,
                property,
                message,
            } => write!(
                f,
                "relationship `{entity}.{property}` has a misconfigured inverse: {message}"
            ),
            Self::TargetMismatch {
                entity,
                property,
                expected,
                actual,
            } => write!(
                f,
                "relationship `{entity}.{property}` expects `{expected}` entities, got `{actual}`"
            ),
        }
    }
}

impl Error for MetadataError {}
