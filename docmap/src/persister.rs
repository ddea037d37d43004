//! The persister boundary: where tracked changes meet physical storage.

use crate::changeset::ChangeSet;
use crate::document::{Document, DocumentRef};
use crate::errors::DocmapResult;

/// Performs physical storage operations for the unit of work.
///
/// # Purpose
/// The unit of work computes what must happen and in what order; a
/// `Persister` implementation makes it happen against the backing store.
/// Persistence encoding, wire formats, and transport are entirely the
/// persister's responsibility.
///
/// # Error contract
/// Any error returned here is treated as an opaque storage failure
/// ([crate::errors::ErrorKind::Storage]), non-retriable within the same
/// commit call. The unit of work stops dispatching further operations
/// immediately (fail-fast) and reports a partial commit to its caller;
/// it never rolls back operations the persister already applied.
///
/// # Usage
/// ```rust,ignore
/// struct MemoryPersister { /* ... */ }
///
/// impl Persister for MemoryPersister {
///     fn insert(&self, doc_ref: &DocumentRef, fields: &Document) -> DocmapResult<()> {
///         // write the full field payload
///         Ok(())
///     }
///
///     fn update(&self, doc_ref: &DocumentRef, changes: &ChangeSet) -> DocmapResult<()> {
///         // apply only the changed fields
///         Ok(())
///     }
///
///     fn delete(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Persister: Send + Sync {
    /// Inserts a new document with its full field payload.
    fn insert(&self, doc_ref: &DocumentRef, fields: &Document) -> DocmapResult<()>;

    /// Applies the changed fields of an already-persisted document.
    fn update(&self, doc_ref: &DocumentRef, changes: &ChangeSet) -> DocmapResult<()>;

    /// Deletes a persisted document.
    fn delete(&self, doc_ref: &DocumentRef) -> DocmapResult<()>;
}
