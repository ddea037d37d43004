use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use crate::mapper_builder::MapperBuilder;
use crate::mapper_config::MapperConfig;
use crate::persister::Persister;
use crate::session::Session;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The main entry point of the document mapper.
///
/// `DocumentMapper` binds a sealed [MapperConfig] to a [Persister] and hands
/// out [Session]s. It provides methods for:
/// - Opening identity-scoped sessions
/// - Accessing the configured mapping metadata
/// - Closing the mapper and every session it created
///
/// `DocumentMapper` uses the PIMPL (Pointer to Implementation) design pattern
/// internally. The implementation details are hidden behind this public
/// interface, providing:
/// - Thread-safety through `Arc<DocumentMapperInner>` cloning
/// - Automatic resource cleanup via `Drop` implementation
/// - Stable API that can evolve without breaking compatibility
///
/// # Examples
///
/// ```rust,ignore
/// use docmap::{DocumentMapper, EntityMapping, doc};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mapper = DocumentMapper::builder()
///     .mapping(
///         EntityMapping::builder("Book")
///             .id_field("id")
///             .scalar("title")
///             .build()?,
///     )
///     .open(persister)?;
///
/// let session = mapper.session()?;
/// let uow = session.begin_unit_of_work()?;
/// uow.register_new("Book", doc! { "id" => 1i64, "title" => "Dune" })?;
/// uow.commit()?;
///
/// mapper.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentMapper {
    inner: Arc<DocumentMapperInner>,
}

impl std::fmt::Debug for DocumentMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentMapper").finish_non_exhaustive()
    }
}

impl DocumentMapper {
    /// Creates a new `MapperBuilder` for configuring and opening a mapper.
    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    pub(crate) fn new(config: MapperConfig, persister: Arc<dyn Persister>) -> Self {
        DocumentMapper {
            inner: Arc::new(DocumentMapperInner::new(config, persister)),
        }
    }

    /// Returns the sealed configuration of this mapper.
    pub fn config(&self) -> &MapperConfig {
        &self.inner.config
    }

    /// Opens a new session.
    ///
    /// Each session scopes identity: the same document identity tracked in
    /// two sessions yields two independent instances. Sessions inherit the
    /// mapper's metadata, persister, and configured lifecycle listeners.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapper is closed.
    pub fn session(&self) -> DocmapResult<Session> {
        self.inner.session()
    }

    /// Returns `true` if the mapper has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Closes the mapper and every session it created.
    ///
    /// Open sessions are closed, detaching their tracked entities and
    /// discarding uncommitted changes. Idempotent.
    pub fn close(&self) -> DocmapResult<()> {
        self.inner.close()
    }
}

struct DocumentMapperInner {
    config: MapperConfig,
    persister: Arc<dyn Persister>,
    closed: AtomicBool,
    sessions: Mutex<Vec<Session>>,
}

impl DocumentMapperInner {
    fn new(config: MapperConfig, persister: Arc<dyn Persister>) -> Self {
        DocumentMapperInner {
            config,
            persister,
            closed: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn session(&self) -> DocmapResult<Session> {
        if self.is_closed() {
            return Err(DocmapError::new(
                "Document mapper is closed",
                ErrorKind::InvalidOperation,
            ));
        }

        let session = Session::with_listeners(
            self.config.registry(),
            self.persister.clone(),
            self.config.listeners(),
        );
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    fn close(&self) -> DocmapResult<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Already closed
            return Ok(());
        }

        let mut sessions = self.sessions.lock();
        for session in sessions.drain(..) {
            let _ = session.close();
        }
        log::debug!("Document mapper closed");
        Ok(())
    }
}

impl Drop for DocumentMapper {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.close();
        }
    }
}
