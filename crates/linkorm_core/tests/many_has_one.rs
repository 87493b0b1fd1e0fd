use linkorm_core::{EntityMetadata, EntityRef, MetadataError, Model};
use std::rc::Rc;

struct Library {
    model: Rc<Model>,
}

impl Library {
    fn new() -> Self {
        let model = Model::builder()
            .entity(
                EntityMetadata::new("Author")
                    .scalar("name")
                    .one_has_many("books", "Book", "author")
                    .one_has_many("translations", "Book", "translator"),
            )
            .entity(
                EntityMetadata::new("Book")
                    .scalar("title")
                    .many_has_one("author", "Author", "books")
                    .many_has_one("translator", "Author", "translations"),
            )
            .entity(EntityMetadata::new("Tag").scalar("label"))
            .build()
            .expect("library model should build");
        Self { model }
    }

    fn author(&self, name: &str) -> EntityRef {
        let author = self.model.repository("Author").unwrap().create().unwrap();
        author.set("name", name).unwrap();
        author
    }

    fn book(&self, title: &str) -> EntityRef {
        let book = self.model.repository("Book").unwrap().create().unwrap();
        book.set("title", title).unwrap();
        book
    }
}

#[test]
fn changing_reference_moves_referrer_between_collections() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let b = lib.author("Asimov");
    let x = lib.book("Dune");

    x.set_reference("author", Some(&a)).unwrap();
    assert!(a.collection_contains("books", &x).unwrap());

    x.set_reference("author", Some(&b)).unwrap();
    assert!(!a.collection_contains("books", &x).unwrap());
    assert!(b.collection_contains("books", &x).unwrap());
    assert!(x.reference("author").unwrap().unwrap().ptr_eq(&b));
}

#[test]
fn setting_from_none_only_adds_and_clearing_only_removes() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let b = lib.author("Asimov");
    let x = lib.book("Dune");
    let y = lib.book("Foundation");
    y.set_reference("author", Some(&b)).unwrap();

    x.set_reference("author", Some(&a)).unwrap();
    assert_eq!(a.collection("books").unwrap().len(), 1);
    assert_eq!(b.collection("books").unwrap().len(), 1);

    x.set_reference("author", None).unwrap();
    assert!(a.collection("books").unwrap().is_empty());
    assert_eq!(b.collection("books").unwrap().len(), 1);
    assert!(x.reference("author").unwrap().is_none());
}

#[test]
fn reassigning_same_target_keeps_single_entry() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let x = lib.book("Dune");

    x.set_reference("author", Some(&a)).unwrap();
    x.set_reference("author", Some(&a)).unwrap();
    assert_eq!(a.collection("books").unwrap().len(), 1);

    x.set_reference("author", None).unwrap();
    x.set_reference("author", None).unwrap();
    assert!(a.collection("books").unwrap().is_empty());
}

#[test]
fn independent_relationships_use_their_own_inverse() {
    let lib = Library::new();
    let writer = lib.author("Lem");
    let translator = lib.author("Kandel");
    let book = lib.book("Cyberiad");

    book.set_reference("author", Some(&writer)).unwrap();
    book.set_reference("translator", Some(&translator)).unwrap();

    assert!(writer.collection_contains("books", &book).unwrap());
    assert!(!writer.collection_contains("translations", &book).unwrap());
    assert!(translator.collection_contains("translations", &book).unwrap());
    assert!(!translator.collection_contains("books", &book).unwrap());
}

#[test]
fn collection_side_api_routes_through_reference() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let b = lib.author("Asimov");
    let x = lib.book("Dune");

    a.add_to_collection("books", &x).unwrap();
    assert!(x.reference("author").unwrap().unwrap().ptr_eq(&a));

    b.add_to_collection("books", &x).unwrap();
    assert!(!a.collection_contains("books", &x).unwrap());
    assert!(b.collection_contains("books", &x).unwrap());

    a.remove_from_collection("books", &x).unwrap();
    assert!(x.reference("author").unwrap().unwrap().ptr_eq(&b));

    b.remove_from_collection("books", &x).unwrap();
    assert!(x.reference("author").unwrap().is_none());
    assert!(b.collection("books").unwrap().is_empty());
}

#[test]
fn rejects_target_of_wrong_type() {
    let lib = Library::new();
    let x = lib.book("Dune");
    let tag = lib.model.repository("Tag").unwrap().create().unwrap();

    let err = x.set_reference("author", Some(&tag)).unwrap_err();
    assert_eq!(
        err,
        MetadataError::TargetMismatch {
            entity: "Book".to_string(),
            property: "author".to_string(),
            expected: "Author".to_string(),
            actual: "Tag".to_string(),
        }
    );
    assert!(x.reference("author").unwrap().is_none());
}

#[test]
fn rejects_non_reference_and_non_collection_properties() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let x = lib.book("Dune");

    assert!(matches!(
        x.set_reference("title", Some(&a)),
        Err(MetadataError::UnexpectedKind { .. })
    ));
    assert!(matches!(
        a.collection("name"),
        Err(MetadataError::UnexpectedKind { .. })
    ));
    assert!(matches!(
        a.collection("missing"),
        Err(MetadataError::UnknownProperty { .. })
    ));
}

#[test]
fn clone_joins_the_targets_collection() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    let x = lib.book("Dune");
    x.set_reference("author", Some(&a)).unwrap();

    let copy = x.duplicate().unwrap();
    assert!(copy.reference("author").unwrap().unwrap().ptr_eq(&a));
    assert!(a.collection_contains("books", &x).unwrap());
    assert!(a.collection_contains("books", &copy).unwrap());

    let author_copy = a.duplicate().unwrap();
    assert!(author_copy.collection("books").unwrap().is_empty());
}

#[test]
fn dropped_referrer_leaves_collection() {
    let lib = Library::new();
    let a = lib.author("Herbert");
    {
        let x = lib.book("Dune");
        x.set_reference("author", Some(&a)).unwrap();
        assert_eq!(a.collection("books").unwrap().len(), 1);
    }
    assert!(a.collection("books").unwrap().is_empty());
}
