//! Inverse (one-has-many) collections.

use crate::entity::{EntityRef, WeakEntityRef};
use crate::metadata::PropertyMetadata;

/// Collection-valued endpoint listing every referrer of its owner.
pub trait ReferenceCollection {
    /// Adds `referrer`; returns `false` when it was already present.
    fn add(&mut self, referrer: &EntityRef) -> bool;
    /// Removes `referrer`; returns `false` when it was absent.
    fn remove(&mut self, referrer: &EntityRef) -> bool;
    fn contains(&self, referrer: &EntityRef) -> bool;
    fn members(&self) -> Vec<EntityRef>;

    fn len(&self) -> usize {
        self.members().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Weakly-held referrers of one entity, in insertion order.
///
/// Referrers own the strong link (their many-has-one reference), so dropped
/// referrers disappear from the collection on their own.
#[derive(Debug, Clone)]
pub struct OneHasMany {
    property: PropertyMetadata,
    members: Vec<WeakEntityRef>,
}

impl OneHasMany {
    pub fn new(property: PropertyMetadata) -> Self {
        Self {
            property,
            members: Vec::new(),
        }
    }

    pub fn property(&self) -> &PropertyMetadata {
        &self.property
    }

    fn prune(&mut self) {
        self.members.retain(WeakEntityRef::is_alive);
    }
}

impl ReferenceCollection for OneHasMany {
    fn add(&mut self, referrer: &EntityRef) -> bool {
        self.prune();
        if self.contains(referrer) {
            return false;
        }
        self.members.push(referrer.downgrade());
        true
    }

    fn remove(&mut self, referrer: &EntityRef) -> bool {
        self.prune();
        let before = self.members.len();
        self.members.retain(|member| !member.points_to(referrer));
        before != self.members.len()
    }

    fn contains(&self, referrer: &EntityRef) -> bool {
        self.members.iter().any(|member| member.points_to(referrer))
    }

    fn members(&self) -> Vec<EntityRef> {
        self.members.iter().filter_map(WeakEntityRef::upgrade).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{OneHasMany, ReferenceCollection};
    use crate::entity::EntityRef;
    use crate::metadata::EntityMetadata;
    use std::rc::Rc;

    fn fixture() -> (OneHasMany, Rc<EntityMetadata>) {
        let author = EntityMetadata::new("Author").one_has_many("books", "Book", "author");
        let property = author.property("books").cloned().expect("books property");
        let book = Rc::new(EntityMetadata::new("Book").many_has_one("author", "Author", "books"));
        (OneHasMany::new(property), book)
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let (mut books, meta) = fixture();
        let book = EntityRef::new(meta);

        assert_eq!(books.property().name, "books");
        assert!(books.add(&book));
        assert!(!books.add(&book));
        assert_eq!(books.len(), 1);

        assert!(books.remove(&book));
        assert!(!books.remove(&book));
        assert!(books.is_empty());
    }

    #[test]
    fn dropped_referrers_vanish() {
        let (mut books, meta) = fixture();
        let kept = EntityRef::new(Rc::clone(&meta));
        {
            let dropped = EntityRef::new(meta);
            books.add(&dropped);
        }
        books.add(&kept);

        let members = books.members();
        assert_eq!(members.len(), 1);
        assert!(members[0].ptr_eq(&kept));
    }
}
