use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use crate::events::LifecycleEventListener;
use crate::mapping::MetadataProvider;
use crate::persister::Persister;
use crate::unit_of_work::UnitOfWork;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A session represents a scoped context for tracked persistence work.
///
/// Manages multiple units of work within a single session, each with its own
/// identity map and scheduled operations. Must be explicitly closed to detach
/// tracked entities and discard uncommitted changes; closing happens
/// automatically on drop as a fallback.
///
/// # Purpose
/// Sessions scope identity: two sessions tracking the same document identity
/// each hold their own instance, and an entity detached in one session is
/// untouched in the other. Each session shares one metadata provider and one
/// persister across the units of work it creates.
///
/// # Characteristics
/// - **Unique ID**: Each session has a unique UUID identifier
/// - **Active State**: Tracks whether the session is open or closed via atomic flag
/// - **Unit Registry**: Maintains HashMap of open units of work
/// - **Thread-Safe**: All internal state protected by Arc and Mutex
/// - **Auto-Cleanup**: Calls `close()` on drop to release resources
/// - **Idempotent Close**: Can be closed multiple times without error
///
/// # Usage
/// ```ignore
/// let session = Session::new(metadata, persister);
/// let uow = session.begin_unit_of_work()?;
/// uow.register_new("Book", book_doc)?;
/// uow.commit()?;
/// session.close()?;
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a new session.
    ///
    /// # Arguments
    /// * `metadata` - Mapping metadata shared by every unit of work
    /// * `persister` - Storage boundary shared by every unit of work
    ///
    /// The session is created in an active state and can immediately be used
    /// to begin units of work.
    pub fn new(metadata: Arc<dyn MetadataProvider>, persister: Arc<dyn Persister>) -> Self {
        Self::with_listeners(metadata, persister, Vec::new())
    }

    /// Creates a new session whose units of work all start with the given
    /// lifecycle listeners registered.
    pub(crate) fn with_listeners(
        metadata: Arc<dyn MetadataProvider>,
        persister: Arc<dyn Persister>,
        listeners: Vec<LifecycleEventListener>,
    ) -> Self {
        Session {
            inner: Arc::new(SessionInner::new(metadata, persister, listeners)),
        }
    }

    /// Gets the session ID.
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Checks if this session is active.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Begins a new unit of work in this session.
    ///
    /// # Returns
    /// * `Ok(UnitOfWork)` - A new, empty unit of work
    /// * `Err(DocmapError)` - If the session is closed
    ///
    /// The unit of work is tracked in the session's registry and is closed
    /// (uncommitted changes discarded) when the session closes.
    pub fn begin_unit_of_work(&self) -> DocmapResult<UnitOfWork> {
        self.inner.begin_unit_of_work()
    }

    /// Lists the IDs of all open units of work in this session.
    pub fn open_units(&self) -> Vec<String> {
        self.inner.open_units()
    }

    /// Closes the session.
    ///
    /// Closes every open unit of work, detaching its tracked entities and
    /// discarding uncommitted changes. Idempotent: calling close multiple
    /// times is safe and returns Ok.
    pub fn close(&self) -> DocmapResult<()> {
        self.inner.close()
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

struct SessionInner {
    id: String,
    active: AtomicBool,
    units: Mutex<HashMap<String, UnitOfWork>>,
    metadata: Arc<dyn MetadataProvider>,
    persister: Arc<dyn Persister>,
    listeners: Vec<LifecycleEventListener>,
}

impl SessionInner {
    fn new(
        metadata: Arc<dyn MetadataProvider>,
        persister: Arc<dyn Persister>,
        listeners: Vec<LifecycleEventListener>,
    ) -> Self {
        SessionInner {
            id: Uuid::new_v4().to_string(),
            active: AtomicBool::new(true),
            units: Mutex::new(HashMap::new()),
            metadata,
            persister,
            listeners,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn begin_unit_of_work(&self) -> DocmapResult<UnitOfWork> {
        self.check_active()?;

        let uow = UnitOfWork::new(self.metadata.clone(), self.persister.clone());
        for listener in &self.listeners {
            uow.event_bus().register(listener.clone())?;
        }
        self.units.lock().insert(uow.id().to_string(), uow.clone());

        Ok(uow)
    }

    fn open_units(&self) -> Vec<String> {
        self.units.lock().keys().cloned().collect()
    }

    fn close(&self) -> DocmapResult<()> {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Already closed
            return Ok(());
        }

        let mut units = self.units.lock();
        for (_, uow) in units.drain() {
            // Discard any uncommitted work
            let _ = uow.close();
        }

        Ok(())
    }

    fn check_active(&self) -> DocmapResult<()> {
        if !self.is_active() {
            return Err(DocmapError::new(
                "Session is closed",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort close - ignore errors
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeSet;
    use crate::doc;
    use crate::document::{Document, DocumentRef};
    use crate::mapping::{EntityMapping, MappingRegistry};
    use crate::unit_of_work::EntityState;

    struct NullPersister;

    impl Persister for NullPersister {
        fn insert(&self, _doc_ref: &DocumentRef, _fields: &Document) -> DocmapResult<()> {
            Ok(())
        }

        fn update(&self, _doc_ref: &DocumentRef, _changes: &ChangeSet) -> DocmapResult<()> {
            Ok(())
        }

        fn delete(&self, _doc_ref: &DocumentRef) -> DocmapResult<()> {
            Ok(())
        }
    }

    fn test_session() -> Session {
        let registry = MappingRegistry::new();
        registry
            .register(
                EntityMapping::builder("Author")
                    .id_field("id")
                    .scalar("name")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Session::new(Arc::new(registry), Arc::new(NullPersister))
    }

    #[test]
    fn session_starts_active_with_unique_id() {
        let session1 = test_session();
        let session2 = test_session();

        assert!(session1.is_active());
        assert_eq!(session1.id().len(), 36); // UUID v4 string length
        assert_ne!(session1.id(), session2.id());
    }

    #[test]
    fn clones_share_the_same_session() {
        let session = test_session();
        let clone = session.clone();

        assert_eq!(session.id(), clone.id());

        let _uow = session.begin_unit_of_work().unwrap();
        assert_eq!(clone.open_units().len(), 1);

        clone.close().unwrap();
        assert!(!session.is_active());
    }

    #[test]
    fn begin_unit_of_work_is_tracked() {
        let session = test_session();
        assert!(session.open_units().is_empty());

        let uow1 = session.begin_unit_of_work().unwrap();
        let uow2 = session.begin_unit_of_work().unwrap();

        assert_ne!(uow1.id(), uow2.id());
        let open = session.open_units();
        assert_eq!(open.len(), 2);
        assert!(open.contains(&uow1.id().to_string()));
        assert!(open.contains(&uow2.id().to_string()));
    }

    #[test]
    fn units_of_the_same_session_track_identity_independently() {
        let session = test_session();
        let uow1 = session.begin_unit_of_work().unwrap();
        let uow2 = session.begin_unit_of_work().unwrap();

        uow1.register_new("Author", doc! { "id" => 1i64 }).unwrap();
        assert!(!uow2.contains(&DocumentRef::new("Author", 1i64)));
        // Same identity is registrable in the other unit
        assert!(uow2.register_new("Author", doc! { "id" => 1i64 }).is_ok());
    }

    #[test]
    fn close_detaches_entities_of_open_units() {
        let session = test_session();
        let uow = session.begin_unit_of_work().unwrap();
        let entity = uow.register_new("Author", doc! { "id" => 1i64 }).unwrap();

        session.close().unwrap();

        assert!(!session.is_active());
        assert!(!uow.is_active());
        assert_eq!(entity.state(), EntityState::Detached);
        assert!(session.open_units().is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let session = test_session();
        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_active());
    }

    #[test]
    fn begin_unit_of_work_on_closed_session_fails() {
        let session = test_session();
        session.close().unwrap();

        let result = session.begin_unit_of_work();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(err.message().contains("closed"));
    }

    #[test]
    fn drop_closes_the_session() {
        let session = test_session();
        let uow = session.begin_unit_of_work().unwrap();

        drop(session);
        assert!(!uow.is_active());
    }
}
