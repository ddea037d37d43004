//! Identity map: one in-memory instance per persisted identity.

use crate::document::DocumentRef;
use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use crate::unit_of_work::TrackedEntity;
use dashmap::DashMap;

/// Maps a [DocumentRef] to the single tracked instance representing that
/// persisted entity.
///
/// # Purpose
/// Guarantees the identity-map uniqueness invariant: within one unit of work
/// session, at most one [TrackedEntity] exists per [DocumentRef]. Everything
/// else — lifecycle, diffing, ordering — is the unit of work's business; this
/// structure has no side effects beyond the map itself.
///
/// # Concurrency
/// Lookups are safe from any thread with no other in-flight mutation, which
/// matches the single-writer session discipline. Mutations are serialized by
/// the owning unit of work.
#[derive(Default)]
pub struct IdentityMap {
    entries: DashMap<DocumentRef, TrackedEntity>,
}

impl IdentityMap {
    /// Creates an empty identity map.
    pub fn new() -> Self {
        IdentityMap::default()
    }

    /// Returns the tracked instance for a ref, if present.
    pub fn get(&self, doc_ref: &DocumentRef) -> Option<TrackedEntity> {
        self.entries.get(doc_ref).map(|entry| entry.value().clone())
    }

    /// Registers a tracked instance for a ref.
    ///
    /// # Errors
    /// Returns an error with kind [ErrorKind::DuplicateIdentity] if the ref
    /// is already present. The existing instance is left untouched.
    pub fn put(&self, doc_ref: DocumentRef, entity: TrackedEntity) -> DocmapResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(doc_ref) {
            Entry::Occupied(occupied) => Err(DocmapError::new(
                &format!(
                    "Another instance is already tracked for {}",
                    occupied.key()
                ),
                ErrorKind::DuplicateIdentity,
            )),
            Entry::Vacant(vacant) => {
                vacant.insert(entity);
                Ok(())
            }
        }
    }

    /// Removes the tracked instance for a ref.
    ///
    /// # Returns
    /// The removed instance, or `None` if the ref was not tracked.
    pub fn remove(&self, doc_ref: &DocumentRef) -> Option<TrackedEntity> {
        self.entries.remove(doc_ref).map(|(_, entity)| entity)
    }

    /// Returns `true` if the ref is tracked.
    pub fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.entries.contains_key(doc_ref)
    }

    /// Returns the number of tracked instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns handles to every tracked instance.
    pub fn entities(&self) -> Vec<TrackedEntity> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Removes every tracked instance, returning the drained handles.
    pub fn drain(&self) -> Vec<TrackedEntity> {
        let entities = self.entities();
        self.entries.clear();
        entities
    }
}
