//! Mapping metadata for tracked document types.
//!
//! The unit of work never reflects over application types. Instead, a
//! [MetadataProvider] declares, per type tag, the ordered field list with
//! per-field kinds, the identifier field, and the reference fields. The
//! [MappingRegistry] is the in-memory implementation applications populate at
//! configuration time through the [EntityMapping] builder:
//!
//! ```rust,ignore
//! use docmap::mapping::{EntityMapping, MappingRegistry};
//!
//! let registry = MappingRegistry::new();
//! registry.register(
//!     EntityMapping::builder("Book")
//!         .id_field("id")
//!         .scalar("title")
//!         .reference("author", "Author", true)
//!         .build()?,
//! )?;
//! ```

use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use dashmap::DashMap;
use std::sync::Arc;

/// The declared semantic kind of a mapped field.
///
/// The change set computer selects its per-field equality from this kind:
/// scalar equality for primitives, deep structural equality for embedded
/// documents, identity equality for references, and element-wise
/// order-sensitive comparison for reference lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A primitive value compared by scalar equality.
    Scalar,
    /// An embedded document compared by deep structural equality.
    Embedded,
    /// A link to another document, compared by [crate::document::DocumentRef].
    Reference {
        /// Type tag of the referenced document type.
        target: String,
        /// Whether the reference must resolve before the owner can persist.
        required: bool,
    },
    /// An ordered sequence of links, compared element-wise and
    /// order-sensitively.
    ReferenceList {
        /// Type tag of the referenced document type.
        target: String,
        /// Whether every element must resolve before the owner can persist.
        required: bool,
    },
}

/// One mapped field: its name and declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// A reference-valued field of a mapped type.
///
/// Returned by [MetadataProvider::reference_fields_of]; the unit of work
/// derives commit-ordering edges from these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpec {
    field_name: String,
    target_type: String,
    required: bool,
    many: bool,
}

impl ReferenceSpec {
    pub fn new(
        field_name: impl Into<String>,
        target_type: impl Into<String>,
        required: bool,
        many: bool,
    ) -> Self {
        ReferenceSpec {
            field_name: field_name.into(),
            target_type: target_type.into(),
            required,
            many,
        }
    }

    /// Returns the name of the reference-valued field.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Returns the type tag of the referenced document type.
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// Returns `true` if the reference is non-nullable.
    pub fn required(&self) -> bool {
        self.required
    }

    /// Returns `true` if the field holds an ordered sequence of references.
    pub fn many(&self) -> bool {
        self.many
    }
}

/// Supplies mapping metadata per document type.
///
/// Consumed by the unit of work and the change set computer; never produced
/// by them. Implementations must be cheap to query since every dirty check
/// walks the field list.
pub trait MetadataProvider: Send + Sync {
    /// Returns the ordered field list of a mapped type.
    fn fields_of(&self, type_tag: &str) -> DocmapResult<Vec<FieldSpec>>;

    /// Returns the name of the identifier field of a mapped type.
    fn identifier_field_of(&self, type_tag: &str) -> DocmapResult<String>;

    /// Returns the reference-valued fields of a mapped type.
    fn reference_fields_of(&self, type_tag: &str) -> DocmapResult<Vec<ReferenceSpec>>;
}

/// The declared mapping of one document type.
///
/// # Purpose
/// Holds the ordered field list and identifier field of a type, built once
/// at configuration time through [EntityMapping::builder]. This is the
/// explicit accessor-per-field declaration that replaces runtime reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    type_tag: String,
    id_field: String,
    fields: Vec<FieldSpec>,
}

impl EntityMapping {
    /// Starts building a mapping for the given type tag.
    pub fn builder(type_tag: impl Into<String>) -> EntityMappingBuilder {
        EntityMappingBuilder {
            type_tag: type_tag.into(),
            id_field: None,
            fields: Vec::new(),
        }
    }

    /// Returns the mapped type tag.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the identifier field name.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Returns the ordered field list.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns the reference-valued fields in mapped order.
    pub fn reference_fields(&self) -> Vec<ReferenceSpec> {
        self.fields
            .iter()
            .filter_map(|spec| match spec.kind() {
                FieldKind::Reference { target, required } => Some(ReferenceSpec::new(
                    spec.name(),
                    target.clone(),
                    *required,
                    false,
                )),
                FieldKind::ReferenceList { target, required } => Some(ReferenceSpec::new(
                    spec.name(),
                    target.clone(),
                    *required,
                    true,
                )),
                _ => None,
            })
            .collect()
    }
}

/// Builder for [EntityMapping].
pub struct EntityMappingBuilder {
    type_tag: String,
    id_field: Option<String>,
    fields: Vec<FieldSpec>,
}

impl EntityMappingBuilder {
    /// Declares the identifier field. Registered as a scalar field if no
    /// field with the same name has been declared yet.
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.fields.iter().any(|f| f.name() == name) {
            self.fields.push(FieldSpec::new(name.clone(), FieldKind::Scalar));
        }
        self.id_field = Some(name);
        self
    }

    /// Declares a scalar field.
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, FieldKind::Scalar));
        self
    }

    /// Declares an embedded document field.
    pub fn embedded(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, FieldKind::Embedded));
        self
    }

    /// Declares a single-valued reference field.
    pub fn reference(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        required: bool,
    ) -> Self {
        self.fields.push(FieldSpec::new(
            name,
            FieldKind::Reference {
                target: target.into(),
                required,
            },
        ));
        self
    }

    /// Declares an ordered list-of-references field.
    pub fn reference_list(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        required: bool,
    ) -> Self {
        self.fields.push(FieldSpec::new(
            name,
            FieldKind::ReferenceList {
                target: target.into(),
                required,
            },
        ));
        self
    }

    /// Finishes the mapping.
    ///
    /// # Errors
    /// - [ErrorKind::ObjectMappingError] if no identifier field was declared
    ///   or a field name was declared twice.
    pub fn build(self) -> DocmapResult<EntityMapping> {
        let id_field = self.id_field.ok_or_else(|| {
            DocmapError::new(
                &format!("Mapping for '{}' declares no identifier field", self.type_tag),
                ErrorKind::ObjectMappingError,
            )
        })?;

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name() == field.name()) {
                return Err(DocmapError::new(
                    &format!(
                        "Mapping for '{}' declares field '{}' more than once",
                        self.type_tag,
                        field.name()
                    ),
                    ErrorKind::ObjectMappingError,
                ));
            }
        }

        Ok(EntityMapping {
            type_tag: self.type_tag,
            id_field,
            fields: self.fields,
        })
    }
}

/// In-memory [MetadataProvider] keyed by type tag.
///
/// # Characteristics
/// - **Concurrent**: Reads and registrations are safe from any thread
/// - **Cheap lookups**: Mappings are shared via `Arc`, never re-built
#[derive(Clone, Default)]
pub struct MappingRegistry {
    mappings: Arc<DashMap<String, Arc<EntityMapping>>>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        MappingRegistry::default()
    }

    /// Registers a mapping.
    ///
    /// # Errors
    /// - [ErrorKind::ObjectMappingError] if the type tag is already registered.
    pub fn register(&self, mapping: EntityMapping) -> DocmapResult<()> {
        let type_tag = mapping.type_tag().to_string();
        if self.mappings.contains_key(&type_tag) {
            return Err(DocmapError::new(
                &format!("Mapping for '{}' is already registered", type_tag),
                ErrorKind::ObjectMappingError,
            ));
        }
        self.mappings.insert(type_tag, Arc::new(mapping));
        Ok(())
    }

    /// Returns the mapping for a type tag, if registered.
    pub fn mapping_of(&self, type_tag: &str) -> Option<Arc<EntityMapping>> {
        self.mappings.get(type_tag).map(|entry| entry.value().clone())
    }

    fn require(&self, type_tag: &str) -> DocmapResult<Arc<EntityMapping>> {
        self.mapping_of(type_tag).ok_or_else(|| {
            DocmapError::new(
                &format!("No mapping registered for type '{}'", type_tag),
                ErrorKind::MetadataNotFound,
            )
        })
    }
}

impl MetadataProvider for MappingRegistry {
    fn fields_of(&self, type_tag: &str) -> DocmapResult<Vec<FieldSpec>> {
        Ok(self.require(type_tag)?.fields().to_vec())
    }

    fn identifier_field_of(&self, type_tag: &str) -> DocmapResult<String> {
        Ok(self.require(type_tag)?.id_field().to_string())
    }

    fn reference_fields_of(&self, type_tag: &str) -> DocmapResult<Vec<ReferenceSpec>> {
        Ok(self.require(type_tag)?.reference_fields())
    }
}
