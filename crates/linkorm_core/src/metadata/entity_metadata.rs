//! Per-entity property declarations.

use super::MetadataError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Shape of one declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// Plain value column.
    Scalar,
    /// Reference to at most one `target` entity; `inverse` is the collection
    /// property on the target that lists every referrer.
    ManyHasOne { target: String, inverse: String },
    /// Inverse collection of `target` entities whose `inverse` reference points
    /// at the owner.
    OneHasMany { target: String, inverse: String },
}

impl PropertyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::ManyHasOne { .. } => "many-has-one",
            Self::OneHasMany { .. } => "one-has-many",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMetadata {
    pub entity: String,
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertyMetadata {
    /// Returns `(target, inverse)` for relationship properties.
    pub fn relationship(&self) -> Option<(&str, &str)> {
        match &self.kind {
            PropertyKind::Scalar => None,
            PropertyKind::ManyHasOne { target, inverse }
            | PropertyKind::OneHasMany { target, inverse } => {
                Some((target.as_str(), inverse.as_str()))
            }
        }
    }

    /// Resolves the inverse collection name of a many-has-one property.
    ///
    /// # Errors
    /// - `UnexpectedKind` when this property is not a many-has-one reference.
    pub fn inverse_collection(&self) -> Result<&str, MetadataError> {
        match &self.kind {
            PropertyKind::ManyHasOne { inverse, .. } => Ok(inverse.as_str()),
            _ => Err(self.unexpected_kind("many-has-one")),
        }
    }

    /// Resolves the referrer-side reference name of a one-has-many property.
    pub fn inverse_reference(&self) -> Result<&str, MetadataError> {
        match &self.kind {
            PropertyKind::OneHasMany { inverse, .. } => Ok(inverse.as_str()),
            _ => Err(self.unexpected_kind("one-has-many")),
        }
    }

    pub(crate) fn unexpected_kind(&self, expected: &'static str) -> MetadataError {
        MetadataError::UnexpectedKind {
            entity: self.entity.clone(),
            property: self.name.clone(),
            expected,
        }
    }
}

/// Declared shape of one entity type.
///
/// Built fluently and checked with [`EntityMetadata::validate`]; the registry
/// performs the cross-entity relationship checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    name: String,
    properties: Vec<PropertyMetadata>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.with_property(name, PropertyKind::Scalar)
    }

    pub fn many_has_one(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        self.with_property(
            name,
            PropertyKind::ManyHasOne {
                target: target.into(),
                inverse: inverse.into(),
            },
        )
    }

    pub fn one_has_many(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        self.with_property(
            name,
            PropertyKind::OneHasMany {
                target: target.into(),
                inverse: inverse.into(),
            },
        )
    }

    fn with_property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(PropertyMetadata {
            entity: self.name.clone(),
            name: name.into(),
            kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Looks up a property, failing with `UnknownProperty`.
    pub fn require_property(&self, name: &str) -> Result<&PropertyMetadata, MetadataError> {
        self.property(name)
            .ok_or_else(|| MetadataError::UnknownProperty {
                entity: self.name.clone(),
                property: name.to_string(),
            })
    }

    /// Validates naming rules and property uniqueness for this entity alone.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if !IDENTIFIER_RE.is_match(&self.name) {
            return Err(MetadataError::InvalidEntityName(self.name.clone()));
        }

        for (index, property) in self.properties.iter().enumerate() {
            if !IDENTIFIER_RE.is_match(&property.name) {
                return Err(MetadataError::InvalidPropertyName {
                    entity: self.name.clone(),
                    property: property.name.clone(),
                });
            }
            if self.properties[..index]
                .iter()
                .any(|earlier| earlier.name == property.name)
            {
                return Err(MetadataError::DuplicateProperty {
                    entity: self.name.clone(),
                    property: property.name.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityMetadata, PropertyKind};
    use crate::metadata::MetadataError;

    #[test]
    fn builds_properties_in_declaration_order() {
        let meta = EntityMetadata::new("Book")
            .scalar("title")
            .many_has_one("author", "Author", "books");

        let names: Vec<&str> = meta.properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "author"]);
        assert_eq!(
            meta.property("author").map(|p| &p.kind),
            Some(&PropertyKind::ManyHasOne {
                target: "Author".to_string(),
                inverse: "books".to_string(),
            })
        );
        meta.validate().expect("metadata should be valid");
    }

    #[test]
    fn rejects_invalid_names() {
        let err = EntityMetadata::new("Book shelf")
            .validate()
            .expect_err("space in entity name must fail");
        assert_eq!(err, MetadataError::InvalidEntityName("Book shelf".to_string()));

        let err = EntityMetadata::new("Book")
            .scalar("1title")
            .validate()
            .expect_err("leading digit must fail");
        assert!(matches!(err, MetadataError::InvalidPropertyName { .. }));
    }

    #[test]
    fn rejects_duplicate_property() {
        let err = EntityMetadata::new("Book")
            .scalar("title")
            .scalar("title")
            .validate()
            .expect_err("duplicate property must fail");
        assert!(matches!(err, MetadataError::DuplicateProperty { .. }));
    }

    #[test]
    fn inverse_resolution_checks_kind() {
        let meta = EntityMetadata::new("Book")
            .scalar("title")
            .many_has_one("author", "Author", "books");

        let author = meta.require_property("author").expect("author property");
        assert_eq!(author.inverse_collection().expect("inverse"), "books");

        let title = meta.require_property("title").expect("title property");
        assert!(matches!(
            title.inverse_collection(),
            Err(MetadataError::UnexpectedKind { .. })
        ));
        assert!(meta.require_property("missing").is_err());
    }
}
