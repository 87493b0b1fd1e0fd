//! Many-has-one references and inverse propagation.

use super::one_has_many::ReferenceCollection;
use crate::entity::EntityRef;
use crate::metadata::{MetadataError, PropertyMetadata};
use log::debug;

/// Scalar endpoint pointing at zero or one related entity.
pub trait ReferenceHolder {
    fn property(&self) -> &PropertyMetadata;
    fn target(&self) -> Option<&EntityRef>;

    fn is_set(&self) -> bool {
        self.target().is_some()
    }
}

/// Owning side of a many-has-one relationship.
///
/// The target is held strongly. A self-reference or a cycle of references
/// keeps every entity on it alive until one link is cleared with
/// `set_reference(.., None)`.
#[derive(Debug, Clone)]
pub struct ManyHasOne {
    property: PropertyMetadata,
    target: Option<EntityRef>,
}

impl ManyHasOne {
    pub fn new(property: PropertyMetadata) -> Self {
        Self {
            property,
            target: None,
        }
    }

    /// Swaps the raw target. Callers must follow up with `update_relationship`.
    pub(crate) fn replace(&mut self, target: Option<EntityRef>) -> Option<EntityRef> {
        std::mem::replace(&mut self.target, target)
    }
}

impl ReferenceHolder for ManyHasOne {
    fn property(&self) -> &PropertyMetadata {
        &self.property
    }

    fn target(&self) -> Option<&EntityRef> {
        self.target.as_ref()
    }
}

/// Moves `referrer` from `old`'s inverse collection to `new`'s.
///
/// Either side may be absent. Both collection operations are idempotent, so a
/// replayed update leaves the graph unchanged.
///
/// # Errors
/// - `UnexpectedKind` when `property` is not a many-has-one reference.
/// - `UnknownProperty` / `UnexpectedKind` when the inverse collection does not
///   exist on a related entity. Model building rejects such metadata up front.
pub fn update_relationship(
    referrer: &EntityRef,
    property: &PropertyMetadata,
    old: Option<&EntityRef>,
    new: Option<&EntityRef>,
) -> Result<(), MetadataError> {
    let inverse = property.inverse_collection()?;

    if let Some(old) = old {
        old.with_collection_mut(inverse, |collection| collection.remove(referrer))?;
    }

    if let Some(new) = new {
        new.with_collection_mut(inverse, |collection| collection.add(referrer))?;
    }

    debug!(
        "event=relationship_update module=relationships status=ok property={}.{} referrer={} old={} new={}",
        property.entity,
        property.name,
        referrer.id(),
        old.map_or_else(|| "none".to_string(), |entity| entity.id().to_string()),
        new.map_or_else(|| "none".to_string(), |entity| entity.id().to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{update_relationship, ManyHasOne, ReferenceHolder};
    use crate::entity::EntityRef;
    use crate::metadata::{EntityMetadata, MetadataError};
    use std::rc::Rc;

    struct Fixture {
        author_meta: Rc<EntityMetadata>,
        book_meta: Rc<EntityMetadata>,
    }

    fn fixture() -> Fixture {
        Fixture {
            author_meta: Rc::new(
                EntityMetadata::new("Author")
                    .scalar("name")
                    .one_has_many("books", "Book", "author"),
            ),
            book_meta: Rc::new(
                EntityMetadata::new("Book")
                    .scalar("title")
                    .many_has_one("author", "Author", "books"),
            ),
        }
    }

    #[test]
    fn holder_reports_its_property_and_target() {
        let fx = fixture();
        let a = EntityRef::new(Rc::clone(&fx.author_meta));
        let property = fx.book_meta.require_property("author").expect("author").clone();
        let mut holder = ManyHasOne::new(property);

        assert_eq!(holder.property().name, "author");
        assert!(!holder.is_set());

        assert!(holder.replace(Some(a.clone())).is_none());
        assert!(holder.is_set());
        assert!(holder.target().expect("target").ptr_eq(&a));
    }

    #[test]
    fn moves_referrer_between_collections() {
        let fx = fixture();
        let a = EntityRef::new(Rc::clone(&fx.author_meta));
        let b = EntityRef::new(Rc::clone(&fx.author_meta));
        let x = EntityRef::new(Rc::clone(&fx.book_meta));
        let property = fx.book_meta.require_property("author").expect("author").clone();

        update_relationship(&x, &property, None, Some(&a)).expect("link a");
        assert!(a.collection_contains("books", &x).expect("books"));

        update_relationship(&x, &property, Some(&a), Some(&b)).expect("move to b");
        assert!(!a.collection_contains("books", &x).expect("books"));
        assert!(b.collection_contains("books", &x).expect("books"));

        update_relationship(&x, &property, Some(&b), None).expect("unlink b");
        assert!(b.collection("books").expect("books").is_empty());
        assert!(a.collection("books").expect("books").is_empty());
    }

    #[test]
    fn replayed_updates_do_not_duplicate() {
        let fx = fixture();
        let a = EntityRef::new(Rc::clone(&fx.author_meta));
        let x = EntityRef::new(Rc::clone(&fx.book_meta));
        let property = fx.book_meta.require_property("author").expect("author").clone();

        update_relationship(&x, &property, None, Some(&a)).expect("first");
        update_relationship(&x, &property, None, Some(&a)).expect("replay");
        assert_eq!(a.collection("books").expect("books").len(), 1);

        update_relationship(&x, &property, Some(&a), None).expect("remove");
        update_relationship(&x, &property, Some(&a), None).expect("replay remove");
        assert!(a.collection("books").expect("books").is_empty());
    }

    #[test]
    fn rejects_non_reference_property() {
        let fx = fixture();
        let x = EntityRef::new(Rc::clone(&fx.book_meta));
        let title = fx.book_meta.require_property("title").expect("title").clone();

        let err = update_relationship(&x, &title, None, None).expect_err("scalar must fail");
        assert!(matches!(err, MetadataError::UnexpectedKind { .. }));
    }

    #[test]
    fn reports_missing_inverse_collection() {
        let fx = fixture();
        let orphan_meta = Rc::new(EntityMetadata::new("Author").scalar("name"));
        let orphan = EntityRef::new(orphan_meta);
        let x = EntityRef::new(Rc::clone(&fx.book_meta));
        let property = fx.book_meta.require_property("author").expect("author").clone();

        let err = update_relationship(&x, &property, None, Some(&orphan))
            .expect_err("missing inverse must fail");
        assert!(matches!(err, MetadataError::UnknownProperty { .. }));
    }
}
