//! Configuration management for the document mapper.

use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use crate::events::LifecycleEventListener;
use crate::mapping::{EntityMapping, MappingRegistry};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Public interface for document mapper configuration.
///
/// Collects entity mappings and lifecycle listeners at configuration time.
/// Once the mapper is opened the configuration is sealed; further mutation
/// fails with [ErrorKind::InvalidOperation].
///
/// # Examples
///
/// ```rust,ignore
/// use docmap::DocumentMapper;
///
/// let mapper = DocumentMapper::builder()
///     .mapping(book_mapping)
///     .open(persister)?;
/// ```
#[derive(Clone)]
pub struct MapperConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning and thread safety.
    inner: Arc<MapperConfigInner>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperConfig {
    /// Creates a new configuration instance with no mappings and no listeners.
    pub fn new() -> Self {
        MapperConfig {
            inner: Arc::new(MapperConfigInner::new()),
        }
    }

    /// Registers an entity mapping.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is sealed or the type tag is
    /// already registered.
    pub fn add_mapping(&self, mapping: EntityMapping) -> DocmapResult<()> {
        self.inner.add_mapping(mapping)
    }

    /// Registers a lifecycle listener applied to every unit of work the
    /// mapper creates.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is sealed.
    pub fn add_listener(&self, listener: LifecycleEventListener) -> DocmapResult<()> {
        self.inner.add_listener(listener)
    }

    /// Returns the mapping registry backing this configuration.
    pub fn registry(&self) -> Arc<MappingRegistry> {
        self.inner.registry.clone()
    }

    /// Returns the configured lifecycle listeners.
    pub(crate) fn listeners(&self) -> Vec<LifecycleEventListener> {
        self.inner.listeners.lock().clone()
    }

    /// Seals the configuration. Called when the mapper opens.
    pub(crate) fn initialize(&self) -> DocmapResult<()> {
        self.inner.configured.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Private implementation of mapper configuration.
struct MapperConfigInner {
    /// Indicates whether this configuration has been sealed
    configured: AtomicBool,
    registry: Arc<MappingRegistry>,
    listeners: Mutex<Vec<LifecycleEventListener>>,
}

impl MapperConfigInner {
    fn new() -> Self {
        MapperConfigInner {
            configured: AtomicBool::new(false),
            registry: Arc::new(MappingRegistry::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn check_mutable(&self) -> DocmapResult<()> {
        if self.configured.load(Ordering::SeqCst) {
            log::error!("Mapper configuration cannot be changed after the mapper is opened");
            return Err(DocmapError::new(
                "Mapper configuration cannot be changed after the mapper is opened",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn add_mapping(&self, mapping: EntityMapping) -> DocmapResult<()> {
        self.check_mutable()?;
        self.registry.register(mapping)
    }

    fn add_listener(&self, listener: LifecycleEventListener) -> DocmapResult<()> {
        self.check_mutable()?;
        self.listeners.lock().push(listener);
        Ok(())
    }
}
