use docmap::errors::ErrorKind;
use docmap::events::{LifecycleEventInfo, LifecycleEventKind, LifecycleEventListener};
use docmap::{doc, DocumentMapper, EntityState, Value};
use docmap_int_test::test_util::{author_ref, create_test_mapper, library_mappings, MemoryPersister};
use parking_lot::Mutex;
use std::sync::Arc;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn sessions_hold_independent_instances_of_the_same_identity() {
    let (mapper, persister) = create_test_mapper();

    // Persist through session one.
    let session1 = mapper.session().unwrap();
    let uow1 = session1.begin_unit_of_work().unwrap();
    let first = uow1
        .register_new("Author", doc! { "id" => 1i64, "name" => "Frank" })
        .unwrap();
    uow1.commit().unwrap();

    // Hydrate the same identity in session two.
    let session2 = mapper.session().unwrap();
    let uow2 = session2.begin_unit_of_work().unwrap();
    let second = uow2
        .merge("Author", persister.stored(&author_ref(1)).unwrap())
        .unwrap();

    // Distinct instances: mutating one does not touch the other.
    second.set("name", "Herbert").unwrap();
    assert_eq!(first.get("name"), Value::from("Frank"));

    // Detaching in one session leaves the other tracking.
    uow2.detach(&author_ref(1)).unwrap();
    assert_eq!(first.state(), EntityState::Managed);
    assert!(uow1.contains(&author_ref(1)));
}

#[test]
fn closing_a_session_discards_uncommitted_work() {
    let (mapper, persister) = create_test_mapper();
    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();

    let author = uow
        .register_new("Author", doc! { "id" => 1i64 })
        .unwrap();
    session.close().unwrap();

    assert_eq!(author.state(), EntityState::Detached);
    assert!(persister.is_empty());
    assert!(uow.commit().is_err());
}

#[test]
fn mapper_close_cascades_to_all_sessions() {
    let (mapper, _persister) = create_test_mapper();
    let session1 = mapper.session().unwrap();
    let session2 = mapper.session().unwrap();

    mapper.close().unwrap();

    assert!(!session1.is_active());
    assert!(!session2.is_active());
    let err = mapper.session().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
}

#[test]
fn configured_listeners_observe_the_full_lifecycle() {
    let seen: Arc<Mutex<Vec<LifecycleEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let persister = MemoryPersister::new();
    let mut builder = DocumentMapper::builder().listener(LifecycleEventListener::new(
        move |event: LifecycleEventInfo| {
            seen_clone.lock().push(event.kind());
            Ok(())
        },
    ));
    for mapping in library_mappings() {
        builder = builder.mapping(mapping);
    }
    let mapper = builder.open(persister).unwrap();

    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();
    let author = uow
        .register_new("Author", doc! { "id" => 1i64, "name" => "Frank" })
        .unwrap();
    uow.commit().unwrap();

    author.set("name", "Herbert").unwrap();
    uow.commit().unwrap();

    uow.schedule_remove(&author_ref(1)).unwrap();
    uow.commit().unwrap();

    let kinds = seen.lock().clone();
    assert_eq!(
        kinds,
        vec![
            LifecycleEventKind::PreCommit,
            LifecycleEventKind::PrePersist,
            LifecycleEventKind::PostPersist,
            LifecycleEventKind::PostCommit,
            LifecycleEventKind::PreCommit,
            LifecycleEventKind::PreUpdate,
            LifecycleEventKind::PostUpdate,
            LifecycleEventKind::PostCommit,
            LifecycleEventKind::PreCommit,
            LifecycleEventKind::PreRemove,
            LifecycleEventKind::PostRemove,
            LifecycleEventKind::PostCommit,
        ]
    );
}

#[test]
fn failing_listener_never_blocks_a_commit() {
    let persister = MemoryPersister::new();
    let mut builder = DocumentMapper::builder().listener(LifecycleEventListener::new(|_| {
        Err(docmap::DocmapError::new(
            "listener bug",
            ErrorKind::InternalError,
        ))
    }));
    for mapping in library_mappings() {
        builder = builder.mapping(mapping);
    }
    let mapper = builder.open(persister.clone()).unwrap();

    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();
    uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();

    assert!(uow.commit().is_ok());
    assert!(persister.contains(&author_ref(1)));
}

#[test]
fn empty_commit_publishes_no_events() {
    let seen: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
    let seen_clone = seen.clone();

    let persister = MemoryPersister::new();
    let mut builder = DocumentMapper::builder().listener(LifecycleEventListener::new(
        move |_| {
            *seen_clone.lock() += 1;
            Ok(())
        },
    ));
    for mapping in library_mappings() {
        builder = builder.mapping(mapping);
    }
    let mapper = builder.open(persister).unwrap();

    let session = mapper.session().unwrap();
    let uow = session.begin_unit_of_work().unwrap();
    uow.commit().unwrap();

    assert_eq!(*seen.lock(), 0);
}
