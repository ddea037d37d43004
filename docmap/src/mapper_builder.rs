use crate::errors::{DocmapError, DocmapResult};
use crate::events::LifecycleEventListener;
use crate::mapper::DocumentMapper;
use crate::mapper_config::MapperConfig;
use crate::mapping::EntityMapping;
use crate::persister::Persister;
use std::sync::Arc;

/// Builder for creating and configuring a [DocumentMapper] instance.
///
/// `MapperBuilder` provides a fluent API for declaring entity mappings and
/// lifecycle listeners before opening the mapper. It follows the builder
/// pattern and captures errors during configuration so they are propagated
/// when opening the mapper.
///
/// # Examples
///
/// ```rust,ignore
/// use docmap::{DocumentMapper, EntityMapping};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mapper = DocumentMapper::builder()
///     .mapping(
///         EntityMapping::builder("Book")
///             .id_field("id")
///             .scalar("title")
///             .reference("author", "Author", true)
///             .build()?,
///     )
///     .open(persister)?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MapperBuilder {
    error: Option<DocmapError>,
    config: MapperConfig,
}

impl MapperBuilder {
    /// Creates a new `MapperBuilder` with an empty configuration.
    pub fn new() -> Self {
        MapperBuilder {
            error: None,
            config: MapperConfig::new(),
        }
    }

    /// Declares an entity mapping.
    ///
    /// # Arguments
    ///
    /// * `mapping` - A mapping built through [EntityMapping::builder]
    ///
    /// # Returns
    ///
    /// This `MapperBuilder` for method chaining. A duplicate type tag is
    /// captured as an error and returned when calling `open()`.
    pub fn mapping(mut self, mapping: EntityMapping) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_mapping(mapping) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Registers a lifecycle listener applied to every unit of work the
    /// mapper creates.
    ///
    /// # Arguments
    ///
    /// * `listener` - A listener wrapping an event callback
    ///
    /// # Returns
    ///
    /// This `MapperBuilder` for method chaining.
    pub fn listener(mut self, listener: LifecycleEventListener) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_listener(listener) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Opens a document mapper with the configured settings.
    ///
    /// This method finalizes the builder configuration, seals it, and binds
    /// the mapper to the given persister. Any errors captured during
    /// configuration are returned here.
    ///
    /// # Arguments
    ///
    /// * `persister` - The storage boundary every session of this mapper uses
    ///
    /// # Returns
    ///
    /// `Ok(DocumentMapper)` if the mapper opened successfully, or
    /// `Err(DocmapError)` if configuration validation failed.
    pub fn open(self, persister: Arc<dyn Persister>) -> DocmapResult<DocumentMapper> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize()?;
        Ok(DocumentMapper::new(self.config, persister))
    }
}
