use docmap::errors::ErrorKind;
use docmap::{doc, DocumentMapper, DocumentRef, EntityMapping, Value};
use docmap_int_test::test_util::{author_ref, book_ref, create_test_mapper, tag_ref, MemoryPersister};
use std::sync::Arc;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn node_ref(id: i64) -> DocumentRef {
    DocumentRef::new("Node", id)
}

/// A mapper whose only type carries a required self-reference, for cycle and
/// missing-reference scenarios.
fn node_mapper() -> (DocumentMapper, Arc<MemoryPersister>) {
    let persister = MemoryPersister::new();
    let mapper = DocumentMapper::builder()
        .mapping(
            EntityMapping::builder("Node")
                .id_field("id")
                .reference("next", "Node", true)
                .build()
                .unwrap(),
        )
        .open(persister.clone())
        .unwrap();
    (mapper, persister)
}

#[test]
fn dependent_inserts_commit_regardless_of_registration_order() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    // Books first, authors last: the insert order must still satisfy the
    // required references, which the persister would otherwise reject.
    uow.register_new(
        "Book",
        doc! { "id" => 10i64, "title" => "Dune", "author" => author_ref(1) },
    )
    .unwrap();
    uow.register_new(
        "Book",
        doc! { "id" => 11i64, "title" => "Hyperion", "author" => author_ref(2) },
    )
    .unwrap();
    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.register_new("Author", doc! { "id" => 2i64 }).unwrap();

    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 4);
    assert_eq!(persister.len(), 4);
}

#[test]
fn reference_chains_resolve_transitively() {
    let (mapper, persister) = node_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    // Managed tail, then a chain 3 -> 2 -> 1 -> tail registered deepest-first.
    uow.merge("Node", doc! { "id" => 0i64, "next" => node_ref(0) })
        .unwrap();
    uow.register_new("Node", doc! { "id" => 3i64, "next" => node_ref(2) })
        .unwrap();
    uow.register_new("Node", doc! { "id" => 2i64, "next" => node_ref(1) })
        .unwrap();
    uow.register_new("Node", doc! { "id" => 1i64, "next" => node_ref(0) })
        .unwrap();

    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 3);
    assert_eq!(persister.len(), 3);
}

#[test]
fn required_reference_cycle_fails_with_nothing_dispatched() {
    let (mapper, persister) = node_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    uow.register_new("Node", doc! { "id" => 1i64, "next" => node_ref(2) })
        .unwrap();
    uow.register_new("Node", doc! { "id" => 2i64, "next" => node_ref(1) })
        .unwrap();

    let error = uow.commit().unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::CircularReference);
    assert!(persister.is_empty());

    // The unit of work is still usable: breaking the cycle changes the error.
    let node1 = uow.find(&node_ref(1)).unwrap();
    node1.unset("next");

    // Node 1 now misses its required reference instead.
    let error = uow.commit().unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::UnresolvedReference);
}

#[test]
fn required_reference_to_untracked_target_fails_before_dispatch() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.register_new(
        "Book",
        doc! { "id" => 10i64, "author" => author_ref(99) },
    )
    .unwrap();

    let error = uow.commit().unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::UnresolvedReference);

    // Ordering failures dispatch nothing, not even the independent author.
    assert!(persister.is_empty());
}

#[test]
fn optional_references_never_block_a_commit() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    // Root tag without parent, child pointing at it, and a book whose
    // optional related list names an untracked book.
    uow.register_new("Tag", doc! { "id" => 1i64, "label" => "root" })
        .unwrap();
    uow.register_new(
        "Tag",
        doc! { "id" => 2i64, "label" => "child", "parent" => tag_ref(1) },
    )
    .unwrap();
    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.register_new(
        "Book",
        doc! {
            "id" => 10i64,
            "author" => author_ref(1),
            "related" => vec![Value::Ref(book_ref(999))],
        },
    )
    .unwrap();

    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 4);
    assert_eq!(persister.len(), 4);
}

#[test]
fn reference_to_managed_target_needs_no_insert() {
    let (mapper, persister) = create_test_mapper();

    // Persist the author first.
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();
    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.commit().unwrap();

    // A later book referencing the managed author commits alone.
    uow.register_new(
        "Book",
        doc! { "id" => 10i64, "author" => author_ref(1) },
    )
    .unwrap();
    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 1);
    assert_eq!(persister.len(), 2);
}

#[test]
fn removed_entities_are_deleted_after_inserts() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.commit().unwrap();

    // One commit mixing an insert with a delete.
    uow.schedule_remove(&author_ref(1)).unwrap();
    uow.register_new("Author", doc! { "id" => 2i64 }).unwrap();

    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 2);
    assert!(!persister.contains(&author_ref(1)));
    assert!(persister.contains(&author_ref(2)));
}

#[test]
fn removing_referencing_and_referenced_entities_together() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();
    uow.register_new(
        "Book",
        doc! { "id" => 10i64, "author" => author_ref(1) },
    )
    .unwrap();
    uow.commit().unwrap();

    uow.schedule_remove(&author_ref(1)).unwrap();
    uow.schedule_remove(&book_ref(10)).unwrap();

    let report = uow.commit().unwrap();
    assert_eq!(report.applied().len(), 2);
    assert!(persister.is_empty());
}
