//! The unit of work: transaction-scoped coordinator of registration,
//! dirty checking, and commit ordering.
//!
//! A [UnitOfWork] tracks every entity touched within one logical transaction.
//! Application code registers new documents, hydrates persisted ones, and
//! schedules removals; nothing reaches storage until [UnitOfWork::commit],
//! which diffs managed entities, orders all scheduled operations by
//! reference dependency, and dispatches them to the [Persister].
//!
//! ```rust,ignore
//! let uow = UnitOfWork::new(metadata, persister);
//!
//! let author = uow.register_new("Author", author_doc)?;
//! let book = uow.register_new("Book", book_doc)?;
//!
//! // author is inserted before book because book requires it
//! let report = uow.commit()?;
//! assert_eq!(report.applied().len(), 2);
//! ```
//!
//! # Sessions and threading
//!
//! A unit of work is a single-writer, request-scoped object. Lookups via
//! [UnitOfWork::find] may run concurrently, but registration, removal
//! scheduling, and commit serialize on an internal mutex. Commit performs
//! blocking persister calls and cannot be cancelled midway; operations are
//! dispatched sequentially because reference ordering must be respected.

mod commit_order;
mod tracked;

pub use tracked::{EntityState, TrackedEntity};

use crate::changeset::{ChangeSet, ChangeSetComputer};
use crate::common::Value;
use crate::document::{Document, DocumentRef};
use crate::errors::{
    CommitReport, DocmapError, DocmapResult, ErrorKind, OperationKind, OperationOutcome,
    OperationStatus,
};
use crate::events::{LifecycleEventBus, LifecycleEventInfo, LifecycleEventKind};
use crate::identity_map::IdentityMap;
use crate::mapping::MetadataProvider;
use crate::persister::Persister;
use commit_order::DependencyGraph;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// One scheduled persistence operation, resolved and ordered.
enum ScheduledOperation {
    Insert(TrackedEntity),
    Update(TrackedEntity, ChangeSet),
    Delete(TrackedEntity),
}

impl ScheduledOperation {
    fn kind(&self) -> OperationKind {
        match self {
            ScheduledOperation::Insert(_) => OperationKind::Insert,
            ScheduledOperation::Update(_, _) => OperationKind::Update,
            ScheduledOperation::Delete(_) => OperationKind::Delete,
        }
    }

    fn entity(&self) -> &TrackedEntity {
        match self {
            ScheduledOperation::Insert(e) => e,
            ScheduledOperation::Update(e, _) => e,
            ScheduledOperation::Delete(e) => e,
        }
    }
}

/// Tracks document identity and changes for one logical transaction.
///
/// # Purpose
/// Owns the identity map, accumulates scheduled operations, and on commit
/// computes change sets, orders operations by reference dependency, and
/// dispatches them to the persister — failing fast and reporting partial
/// commits without compensating rollbacks.
///
/// # Characteristics
/// - **Identity**: At most one tracked instance per [DocumentRef]
/// - **Request-scoped**: One instance per logical transaction; see [crate::session::Session]
/// - **Single-writer**: Mutating calls serialize on an internal mutex
/// - **Thread-safe handle**: Clones share the same underlying state
#[derive(Clone)]
pub struct UnitOfWork {
    inner: Arc<UnitOfWorkInner>,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").field("id", &self.id()).finish_non_exhaustive()
    }
}

impl UnitOfWork {
    /// Creates a new unit of work over the given metadata provider and
    /// persister, with a fresh lifecycle event bus.
    pub fn new(metadata: Arc<dyn MetadataProvider>, persister: Arc<dyn Persister>) -> Self {
        UnitOfWork {
            inner: Arc::new(UnitOfWorkInner::new(metadata, persister)),
        }
    }

    /// Returns the unique id of this unit of work.
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Returns `true` if the unit of work accepts operations.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Returns the lifecycle event bus of this unit of work.
    pub fn event_bus(&self) -> &LifecycleEventBus {
        &self.inner.event_bus
    }

    /// Registers a never-persisted document.
    ///
    /// The entity enters [EntityState::New]; it is inserted at the next
    /// commit. The identifier field declared for `type_tag` must be present
    /// in the document.
    ///
    /// # Errors
    /// - [ErrorKind::InvalidId] if the identifier field is missing or null
    /// - [ErrorKind::DuplicateIdentity] if the identity is already tracked
    /// - [ErrorKind::InvalidOperation] if the unit of work is closed
    pub fn register_new(&self, type_tag: &str, document: Document) -> DocmapResult<TrackedEntity> {
        self.inner.register(type_tag, document, false)
    }

    /// Registers a document hydrated from the backing store.
    ///
    /// The entity enters [EntityState::Managed] directly, with the given
    /// document as its persisted snapshot. Subsequent mutations are detected
    /// by dirty checking at commit.
    ///
    /// # Errors
    /// Same as [UnitOfWork::register_new].
    pub fn merge(&self, type_tag: &str, document: Document) -> DocmapResult<TrackedEntity> {
        self.inner.register(type_tag, document, true)
    }

    /// Schedules a managed entity for deletion at the next commit.
    ///
    /// # Errors
    /// - [ErrorKind::NotManaged] if the ref is untracked or not in
    ///   [EntityState::Managed]
    pub fn schedule_remove(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        self.inner.schedule_remove(doc_ref)
    }

    /// Detaches an entity from this unit of work.
    ///
    /// The entity enters the terminal [EntityState::Detached] state and is no
    /// longer tracked; pending changes for it are discarded. Detaching an
    /// untracked ref is a no-op.
    pub fn detach(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        self.inner.detach(doc_ref)
    }

    /// Returns the tracked instance for a ref, if present.
    pub fn find(&self, doc_ref: &DocumentRef) -> Option<TrackedEntity> {
        self.inner.identity_map.get(doc_ref)
    }

    /// Returns `true` if the ref is tracked.
    pub fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.inner.identity_map.contains(doc_ref)
    }

    /// Returns the number of tracked entities.
    pub fn size(&self) -> usize {
        self.inner.identity_map.len()
    }

    /// Commits all scheduled operations.
    ///
    /// Inserts and updates dispatch in reference-dependency order, deletes
    /// afterwards in inverted order. On the first persister failure the
    /// commit stops: already-applied entities keep their new state, the rest
    /// keep their prior state, and the error carries a [CommitReport] naming
    /// every operation's fate. Re-invoking commit resumes from the first
    /// failure.
    ///
    /// # Errors
    /// - [ErrorKind::CircularReference] if new entities require each other
    /// - [ErrorKind::UnresolvedReference] if a required reference points at
    ///   an untracked document
    /// - [ErrorKind::PartialCommit] if the persister failed partway
    /// - [ErrorKind::InvalidOperation] if the unit of work is closed
    pub fn commit(&self) -> DocmapResult<CommitReport> {
        self.inner.commit()
    }

    /// Closes the unit of work, detaching every tracked entity.
    ///
    /// Pending (uncommitted) operations are discarded. Idempotent.
    pub fn close(&self) -> DocmapResult<()> {
        self.inner.close()
    }
}

struct UnitOfWorkInner {
    id: String,
    active: AtomicBool,
    identity_map: IdentityMap,
    // registration order of currently tracked refs; commit dispatch is
    // deterministic because ordering ties break on this
    order: Mutex<Vec<DocumentRef>>,
    metadata: Arc<dyn MetadataProvider>,
    persister: Arc<dyn Persister>,
    computer: ChangeSetComputer,
    event_bus: LifecycleEventBus,
    // serializes register/remove/detach/commit; lookups stay lock-free
    write_lock: Mutex<()>,
}

impl UnitOfWorkInner {
    fn new(metadata: Arc<dyn MetadataProvider>, persister: Arc<dyn Persister>) -> Self {
        UnitOfWorkInner {
            id: Uuid::new_v4().to_string(),
            active: AtomicBool::new(true),
            identity_map: IdentityMap::new(),
            order: Mutex::new(Vec::new()),
            computer: ChangeSetComputer::new(metadata.clone()),
            metadata,
            persister,
            event_bus: LifecycleEventBus::new(),
            write_lock: Mutex::new(()),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn check_active(&self) -> DocmapResult<()> {
        if !self.is_active() {
            return Err(DocmapError::new(
                "Unit of work is closed",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn register(
        &self,
        type_tag: &str,
        document: Document,
        hydrated: bool,
    ) -> DocmapResult<TrackedEntity> {
        self.check_active()?;
        let _guard = self.write_lock.lock();

        let id_field = self.metadata.identifier_field_of(type_tag)?;
        let id = document.get(&id_field);
        if id == Value::Null {
            return Err(DocmapError::new(
                &format!(
                    "Document of type '{}' has no value for identifier field '{}'",
                    type_tag, id_field
                ),
                ErrorKind::InvalidId,
            ));
        }

        let doc_ref = DocumentRef::new(type_tag, id);
        let entity = if hydrated {
            TrackedEntity::hydrated(doc_ref.clone(), document)
        } else {
            TrackedEntity::new_entity(doc_ref.clone(), document)
        };

        self.identity_map.put(doc_ref.clone(), entity.clone())?;
        self.order.lock().push(doc_ref);
        Ok(entity)
    }

    fn schedule_remove(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        self.check_active()?;
        let _guard = self.write_lock.lock();

        let entity = self.identity_map.get(doc_ref).ok_or_else(|| {
            DocmapError::new(
                &format!("{} is not tracked by this unit of work", doc_ref),
                ErrorKind::NotManaged,
            )
        })?;

        match entity.state() {
            EntityState::Managed => {
                entity.set_state(EntityState::Removed);
                Ok(())
            }
            state => Err(DocmapError::new(
                &format!("{} is {} and cannot be scheduled for removal", doc_ref, state),
                ErrorKind::NotManaged,
            )),
        }
    }

    fn detach(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        self.check_active()?;
        let _guard = self.write_lock.lock();

        if let Some(entity) = self.identity_map.remove(doc_ref) {
            entity.set_state(EntityState::Detached);
            self.order.lock().retain(|r| r != doc_ref);
        }
        Ok(())
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

        let _guard = self.write_lock.lock();
        for entity in self.identity_map.drain() {
            entity.set_state(EntityState::Detached);
        }
        self.order.lock().clear();
        self.event_bus.close()?;
        log::debug!("Unit of work {} closed", self.id);
        Ok(())
    }

    fn commit(&self) -> DocmapResult<CommitReport> {
        self.check_active()?;
        let _guard = self.write_lock.lock();

        let operations = self.plan_operations()?;
        if operations.is_empty() {
            return Ok(CommitReport::new());
        }

        self.publish(LifecycleEventKind::PreCommit, None);

        let mut report = CommitReport::new();
        let mut first_failure: Option<DocmapError> = None;

        for operation in operations {
            let doc_ref = operation.entity().doc_ref().clone();
            if first_failure.is_some() {
                report.record(OperationOutcome::new(
                    doc_ref,
                    operation.kind(),
                    OperationStatus::Skipped,
                ));
                continue;
            }

            match self.dispatch(&operation) {
                Ok(()) => {
                    report.record(OperationOutcome::new(
                        doc_ref,
                        operation.kind(),
                        OperationStatus::Applied,
                    ));
                }
                Err(error) => {
                    log::warn!(
                        "Commit of unit of work {} aborted: {} of {} failed: {}",
                        self.id,
                        operation.kind(),
                        doc_ref,
                        error
                    );
                    report.record(OperationOutcome::new(
                        doc_ref,
                        operation.kind(),
                        OperationStatus::Failed(error.message().to_string()),
                    ));
                    first_failure = Some(error);
                }
            }
        }

        match first_failure {
            Some(cause) => Err(DocmapError::new_with_cause(
                "Commit aborted after persister failure; see the commit report for per-operation outcomes",
                ErrorKind::PartialCommit(report),
                cause,
            )),
            None => {
                self.publish(LifecycleEventKind::PostCommit, None);
                Ok(report)
            }
        }
    }

    /// Resolves what this commit must do and in which order. Nothing is
    /// dispatched from here; ordering errors leave every entity untouched.
    fn plan_operations(&self) -> DocmapResult<Vec<ScheduledOperation>> {
        let order = self.order.lock().clone();

        let mut graph = DependencyGraph::new();
        let mut inserts: Vec<TrackedEntity> = Vec::new();
        let mut updates: Vec<(TrackedEntity, ChangeSet)> = Vec::new();
        let mut removals: Vec<TrackedEntity> = Vec::new();

        for doc_ref in &order {
            let Some(entity) = self.identity_map.get(doc_ref) else {
                continue;
            };
            match entity.state() {
                EntityState::New => {
                    graph.add_node(doc_ref.clone());
                    inserts.push(entity);
                }
                EntityState::Managed => {
                    let change_set = self.computer.compute_change_set(&entity)?;
                    if !change_set.is_empty() {
                        graph.add_node(doc_ref.clone());
                        updates.push((entity, change_set));
                    }
                }
                EntityState::Removed => removals.push(entity),
                EntityState::Detached => {}
            }
        }

        // Reference edges: a required reference from A to a New B demands B
        // before A. References to Managed targets need no edge; optional
        // references never force an order.
        for entity in inserts.iter().chain(updates.iter().map(|(e, _)| e)) {
            let required_new = entity.state() == EntityState::New;
            for spec in self.metadata.reference_fields_of(entity.doc_ref().type_tag())? {
                let value = entity.get(spec.field_name());
                let targets = reference_targets(&value);

                if spec.required() && required_new && targets.is_empty() && !spec.many() {
                    return Err(DocmapError::new(
                        &format!(
                            "Required reference '{}' of {} is not set",
                            spec.field_name(),
                            entity.doc_ref()
                        ),
                        ErrorKind::UnresolvedReference,
                    ));
                }

                for target in targets {
                    if !spec.required() {
                        continue;
                    }
                    match self.identity_map.get(&target).map(|t| t.state()) {
                        Some(EntityState::New) => {
                            graph.add_edge(&target, entity.doc_ref());
                        }
                        Some(EntityState::Managed) => {}
                        _ => {
                            return Err(DocmapError::new(
                                &format!(
                                    "Required reference '{}' of {} points at {}, which is not tracked as new or managed",
                                    spec.field_name(),
                                    entity.doc_ref(),
                                    target
                                ),
                                ErrorKind::UnresolvedReference,
                            ));
                        }
                    }
                }
            }
        }

        let ordered = graph.topo_sort().map_err(|cycle| {
            let members = cycle
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            DocmapError::new(
                &format!("Circular required references among new documents: {}", members),
                ErrorKind::CircularReference,
            )
        })?;

        let mut operations = Vec::with_capacity(ordered.len() + removals.len());
        for doc_ref in ordered {
            if let Some(i) = inserts.iter().position(|e| e.doc_ref() == &doc_ref) {
                operations.push(ScheduledOperation::Insert(inserts[i].clone()));
            } else if let Some(i) = updates.iter().position(|(e, _)| e.doc_ref() == &doc_ref) {
                let (entity, change_set) = updates[i].clone();
                operations.push(ScheduledOperation::Update(entity, change_set));
            }
        }

        // Deletes run last, in inverted dependency order: a removed entity
        // referencing another removed entity is deleted first.
        let mut delete_graph = DependencyGraph::new();
        for entity in &removals {
            delete_graph.add_node(entity.doc_ref().clone());
        }
        for entity in &removals {
            for spec in self.metadata.reference_fields_of(entity.doc_ref().type_tag())? {
                let value = entity.get(spec.field_name());
                for target in reference_targets(&value) {
                    if delete_graph.contains(&target) {
                        delete_graph.add_edge(entity.doc_ref(), &target);
                    }
                }
            }
        }
        for doc_ref in delete_graph.topo_sort_tolerant() {
            if let Some(i) = removals.iter().position(|e| e.doc_ref() == &doc_ref) {
                operations.push(ScheduledOperation::Delete(removals[i].clone()));
            }
        }

        Ok(operations)
    }

    fn dispatch(&self, operation: &ScheduledOperation) -> DocmapResult<()> {
        match operation {
            ScheduledOperation::Insert(entity) => {
                let doc_ref = entity.doc_ref().clone();
                self.publish(LifecycleEventKind::PrePersist, Some(doc_ref.clone()));
                self.persister.insert(&doc_ref, &entity.document())?;
                entity.set_state(EntityState::Managed);
                entity.refresh_snapshot();
                self.publish(LifecycleEventKind::PostPersist, Some(doc_ref));
            }
            ScheduledOperation::Update(entity, change_set) => {
                let doc_ref = entity.doc_ref().clone();
                self.publish(LifecycleEventKind::PreUpdate, Some(doc_ref.clone()));
                self.persister.update(&doc_ref, change_set)?;
                entity.refresh_snapshot();
                self.publish(LifecycleEventKind::PostUpdate, Some(doc_ref));
            }
            ScheduledOperation::Delete(entity) => {
                let doc_ref = entity.doc_ref().clone();
                self.publish(LifecycleEventKind::PreRemove, Some(doc_ref.clone()));
                self.persister.delete(&doc_ref)?;
                entity.set_state(EntityState::Detached);
                self.identity_map.remove(&doc_ref);
                self.order.lock().retain(|r| r != &doc_ref);
                self.publish(LifecycleEventKind::PostRemove, Some(doc_ref));
            }
        }
        Ok(())
    }

    fn publish(&self, kind: LifecycleEventKind, doc_ref: Option<DocumentRef>) {
        if let Err(e) = self.event_bus.publish(LifecycleEventInfo::new(kind, doc_ref)) {
            log::warn!("Failed to publish lifecycle event: {}", e);
        }
    }
}

/// Extracts the referenced identities from a reference-valued field.
fn reference_targets(value: &Value) -> Vec<DocumentRef> {
    match value {
        Value::Ref(doc_ref) => vec![doc_ref.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_ref_value().cloned())
            .collect(),
        _ => Vec::new(),
    }
}
