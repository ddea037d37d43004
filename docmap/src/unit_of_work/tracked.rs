use crate::common::{atomic, Atomic, Value};
use crate::document::{Document, DocumentRef};
use crate::errors::DocmapResult;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Lifecycle state of a tracked entity within one unit of work session.
///
/// Transitions are monotonic per session except the Managed/Removed pair:
///
/// ```text
/// New ──commit──► Managed ──schedule_remove──► Removed ──commit──► Detached
///                    ▲                            │
///                    └──────(failed commit)───────┘
/// ```
///
/// `Detached` is terminal; a detached entity is no longer tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Registered in this session, never persisted.
    New,
    /// Persisted and tracked; dirty-checked at commit.
    Managed,
    /// Scheduled for deletion at the next commit.
    Removed,
    /// No longer tracked by any session.
    Detached,
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::New => write!(f, "new"),
            EntityState::Managed => write!(f, "managed"),
            EntityState::Removed => write!(f, "removed"),
            EntityState::Detached => write!(f, "detached"),
        }
    }
}

/// A live document instance tracked by a unit of work.
///
/// # Purpose
/// Wraps the live [Document] of one logical entity together with its
/// [DocumentRef], its last-known-persisted snapshot, and its lifecycle
/// state. The handle is cheap to clone; all clones observe and mutate the
/// same underlying instance, which is what makes the identity map guarantee
/// meaningful.
///
/// # Snapshot discipline
/// The snapshot changes only at commit boundaries (taken when an insert or
/// update is applied) — never during dirty checking. A `None` snapshot marks
/// a never-persisted entity, for which every mapped field counts as changed.
///
/// # Usage
/// ```rust,ignore
/// let entity = uow.register_new("Book", book_doc)?;
/// entity.set("title", "Updated title")?;
/// assert_eq!(entity.state(), EntityState::New);
/// ```
#[derive(Clone)]
pub struct TrackedEntity {
    inner: Arc<TrackedEntityInner>,
}

struct TrackedEntityInner {
    doc_ref: DocumentRef,
    live: Atomic<Document>,
    snapshot: Atomic<Option<Document>>,
    state: Atomic<EntityState>,
}

impl TrackedEntity {
    /// Creates a tracked entity in [EntityState::New] with no snapshot.
    pub(crate) fn new_entity(doc_ref: DocumentRef, document: Document) -> Self {
        TrackedEntity {
            inner: Arc::new(TrackedEntityInner {
                doc_ref,
                live: atomic(document),
                snapshot: atomic(None),
                state: atomic(EntityState::New),
            }),
        }
    }

    /// Creates a tracked entity in [EntityState::Managed] whose snapshot is
    /// the hydrated document itself.
    pub(crate) fn hydrated(doc_ref: DocumentRef, document: Document) -> Self {
        TrackedEntity {
            inner: Arc::new(TrackedEntityInner {
                doc_ref,
                live: atomic(document.clone()),
                snapshot: atomic(Some(document)),
                state: atomic(EntityState::Managed),
            }),
        }
    }

    /// Returns the identity of this entity.
    pub fn doc_ref(&self) -> &DocumentRef {
        &self.inner.doc_ref
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> EntityState {
        *self.inner.state.read()
    }

    pub(crate) fn set_state(&self, state: EntityState) {
        *self.inner.state.write() = state;
    }

    /// Reads one field of the live document.
    ///
    /// # Returns
    /// A clone of the current value, or [Value::Null] if the field is absent.
    pub fn get(&self, field: &str) -> Value {
        self.inner.live.read().get(field)
    }

    /// Writes one field of the live document.
    ///
    /// The unit of work observes the change at the next dirty check; nothing
    /// is persisted until commit.
    pub fn set<T: Into<Value>>(&self, field: impl Into<String>, value: T) -> DocmapResult<()> {
        self.inner.live.write().put(field, value)
    }

    /// Removes one field from the live document.
    pub fn unset(&self, field: &str) -> Option<Value> {
        self.inner.live.write().remove(field)
    }

    /// Returns a clone of the current live document.
    pub fn document(&self) -> Document {
        self.inner.live.read().clone()
    }

    /// Returns a clone of the last-known-persisted snapshot, if any.
    pub fn snapshot(&self) -> Option<Document> {
        self.inner.snapshot.read().clone()
    }

    /// Refreshes the snapshot from the current live values. Called only when
    /// the persister has applied an insert or update for this entity.
    pub(crate) fn refresh_snapshot(&self) {
        let current = self.inner.live.read().clone();
        *self.inner.snapshot.write() = Some(current);
    }
}

impl Debug for TrackedEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrackedEntity({}, {})",
            self.inner.doc_ref,
            self.state()
        )
    }
}
