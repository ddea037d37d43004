use backtrace::Backtrace;
#[cfg(feature = "serde")]
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};
use crate::document::DocumentRef;

/// Error kinds for document mapper operations.
///
/// This enum represents all possible error types that can occur while
/// tracking, diffing, and committing mapped documents. Each kind describes a
/// specific category of failure, enabling precise error handling.
///
/// # Examples
///
/// ```rust,ignore
/// use docmap::errors::{DocmapError, ErrorKind, DocmapResult};
///
/// fn example() -> DocmapResult<()> {
///     Err(DocmapError::new("Entity is not managed", ErrorKind::NotManaged))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Identity Errors - raised by the identity map and registration
    /// Another tracked instance already exists for the same document identity
    DuplicateIdentity,
    /// The identifier field is missing or unusable
    InvalidId,
    /// Invalid field name
    InvalidFieldName,

    // Lifecycle Errors - raised by unit of work state transitions
    /// The operation requires a managed entity but the ref is not managed
    NotManaged,
    /// The operation is not valid in the current context (e.g. closed session)
    InvalidOperation,

    // Commit Ordering Errors - raised before any operation is dispatched
    /// A cycle of required references was detected among new entities
    CircularReference,
    /// A required reference points at a document tracked by nobody
    UnresolvedReference,

    // Storage Errors - raised by the persister boundary
    /// Opaque failure from the persister; non-retriable within the same commit
    Storage,
    /// A commit was aborted partway; carries the per-operation outcomes
    PartialCommit(CommitReport),

    // Mapping Errors - raised by the metadata provider
    /// No mapping metadata is registered for the requested type tag
    MetadataNotFound,
    /// Error mapping a value to/from a document
    ObjectMappingError,

    // Event Errors - raised by the lifecycle event bus
    /// Error in lifecycle event processing
    EventError,

    // Generic/Internal Errors - used as fallback
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DuplicateIdentity => write!(f, "Duplicate identity"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::NotManaged => write!(f, "Not managed"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::CircularReference => write!(f, "Circular reference"),
            ErrorKind::UnresolvedReference => write!(f, "Unresolved reference"),
            ErrorKind::Storage => write!(f, "Storage error"),
            ErrorKind::PartialCommit(report) => write!(
                f,
                "Partial commit ({} applied, {} failed, {} skipped)",
                report.applied().len(),
                report.failed().len(),
                report.skipped().len()
            ),
            ErrorKind::MetadataNotFound => write!(f, "Metadata not found"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The kind of persistence operation dispatched during a commit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OperationKind {
    /// A first-time insert of a new entity.
    Insert,
    /// A change set update of a managed entity.
    Update,
    /// A deletion of a removed entity.
    Delete,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// The fate of one scheduled operation within a commit.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OperationStatus {
    /// The persister accepted the operation; the entity transitioned.
    Applied,
    /// The persister rejected the operation; the entity kept its prior state.
    Failed(String),
    /// The operation was never dispatched because an earlier one failed.
    Skipped,
}

/// The outcome of one scheduled operation.
///
/// Carried by [CommitReport] so a caller inspecting a partial commit can tell
/// exactly which document each outcome belongs to.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OperationOutcome {
    doc_ref: DocumentRef,
    kind: OperationKind,
    status: OperationStatus,
}

impl OperationOutcome {
    pub fn new(doc_ref: DocumentRef, kind: OperationKind, status: OperationStatus) -> Self {
        OperationOutcome {
            doc_ref,
            kind,
            status,
        }
    }

    /// Returns the identity of the document the operation targeted.
    pub fn doc_ref(&self) -> &DocumentRef {
        &self.doc_ref
    }

    /// Returns the kind of operation.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns the status of the operation.
    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    /// Returns `true` if the persister accepted this operation.
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OperationStatus::Applied)
    }
}

/// Per-operation outcomes of one commit call.
///
/// # Purpose
/// Records what happened to every operation the unit of work scheduled. After
/// a fully successful commit this is returned directly with all outcomes
/// `Applied`. After a fail-fast abort it is carried inside
/// [ErrorKind::PartialCommit] so the caller can see which operations
/// succeeded, which one failed, and which were never dispatched.
///
/// # Retry
/// Entities behind `Applied` outcomes are already `Managed` or `Detached`;
/// re-invoking commit skips them and resumes from the first failure.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct CommitReport {
    outcomes: Vec<OperationOutcome>,
}

impl CommitReport {
    pub fn new() -> Self {
        CommitReport::default()
    }

    pub(crate) fn record(&mut self, outcome: OperationOutcome) {
        self.outcomes.push(outcome);
    }

    /// Returns all outcomes in dispatch order.
    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    /// Returns the outcomes the persister accepted.
    pub fn applied(&self) -> Vec<&OperationOutcome> {
        self.outcomes.iter().filter(|o| o.is_applied()).collect()
    }

    /// Returns the outcomes the persister rejected.
    pub fn failed(&self) -> Vec<&OperationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status(), OperationStatus::Failed(_)))
            .collect()
    }

    /// Returns the outcomes that were never dispatched.
    pub fn skipped(&self) -> Vec<&OperationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status(), OperationStatus::Skipped))
            .collect()
    }

    /// Returns `true` if the commit scheduled no operations at all.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the number of scheduled operations.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

/// Custom document mapper error type.
///
/// `DocmapError` encapsulates error information including the error message,
/// kind, and optional cause. It supports error chaining and backtraces for
/// debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use docmap::errors::{DocmapError, ErrorKind};
///
/// // Create a simple error
/// let err = DocmapError::new("Entity is not managed", ErrorKind::NotManaged);
///
/// // Create an error with a cause
/// let cause = DocmapError::new("Connection reset", ErrorKind::Storage);
/// let err = DocmapError::new_with_cause("Insert failed", ErrorKind::Storage, cause);
/// ```
///
/// # Type alias
///
/// The `DocmapResult<T>` type alias is equivalent to `Result<T, DocmapError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct DocmapError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocmapError>>,
    backtrace: Atomic<Backtrace>,
}

impl DocmapError {
    /// Creates a new `DocmapError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocmapError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `DocmapError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocmapError) -> Self {
        DocmapError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<DocmapError>> {
        self.cause.as_ref()
    }

    /// Returns the commit report if this is a [ErrorKind::PartialCommit] error.
    pub fn commit_report(&self) -> Option<&CommitReport> {
        match &self.error_kind {
            ErrorKind::PartialCommit(report) => Some(report),
            _ => None,
        }
    }
}

impl Display for DocmapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocmapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for DocmapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for document mapper operations.
///
/// `DocmapResult<T>` is shorthand for `Result<T, DocmapError>`.
/// All fallible docmap operations return this type.
pub type DocmapResult<T> = Result<T, DocmapError>;

#[cfg(feature = "serde")]
impl de::Error for DocmapError {
    fn custom<T: Display>(msg: T) -> Self {
        DocmapError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

#[cfg(feature = "serde")]
impl ser::Error for DocmapError {
    fn custom<T: Display>(msg: T) -> Self {
        DocmapError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

// From trait implementations for automatic error conversion
impl From<String> for DocmapError {
    fn from(msg: String) -> Self {
        DocmapError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocmapError {
    fn from(msg: &str) -> Self {
        DocmapError::new(msg, ErrorKind::InternalError)
    }
}
