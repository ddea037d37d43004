//! Documents and document identity.
//!
//! A [Document] is an ordered key-value map where keys are field names and
//! values are [Value] objects. Documents are the in-memory shape of every
//! mapped entity: the unit of work reads current field values from a live
//! document and keeps a second document as the last-known-persisted snapshot.
//!
//! ```rust,ignore
//! use docmap::document::Document;
//!
//! let mut doc = Document::new();
//! doc.put("name", "Alice")?;
//! doc.put("age", 30i64)?;
//! ```
//!
//! A [DocumentRef] is the value identity of one logical document: the mapped
//! type tag plus the identifier field value. Equality is by value; the unit
//! of work guarantees at most one tracked instance per [DocumentRef].

use crate::common::Value;
use crate::errors::{DocmapResult, DocmapError, ErrorKind};
use indexmap::IndexMap;
use std::fmt::{Debug, Display, Formatter};

/// An ordered field map representing one mapped document.
///
/// # Purpose
/// Holds the field values of a mapped entity. Field order is preserved so
/// that change sets and persister payloads follow the mapped field order.
///
/// # Characteristics
/// - **Ordered**: Iteration follows insertion order
/// - **Structural equality**: Two documents are equal when they hold the same
///   fields with equal values, regardless of field order
/// - **Serializable**: Optional serde support behind the `serde` feature
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            fields: IndexMap::new(),
        }
    }

    /// Returns `true` if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields in the document.
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    /// Puts a field value into the document, replacing any previous value.
    ///
    /// # Arguments
    /// * `field` - The field name; must not be empty
    /// * `value` - Any type convertible into [Value]
    ///
    /// # Errors
    /// Returns an error with kind [ErrorKind::InvalidFieldName] if the field
    /// name is empty.
    pub fn put<T: Into<Value>>(&mut self, field: impl Into<String>, value: T) -> DocmapResult<()> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(DocmapError::new(
                "Field name cannot be empty",
                ErrorKind::InvalidFieldName,
            ));
        }
        self.fields.insert(field, value.into());
        Ok(())
    }

    /// Gets the value of a field.
    ///
    /// # Returns
    /// A clone of the field value, or [Value::Null] if the field is absent.
    /// An absent field and an explicit null are indistinguishable to the
    /// change set computer, which is the intended dirty-checking semantic.
    pub fn get(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Removes a field from the document.
    ///
    /// # Returns
    /// The removed value, or `None` if the field was not present.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Returns `true` if the document contains the given field.
    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the field names in insertion order.
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Iterates over `(field, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// The value identity of one logical document.
///
/// # Purpose
/// Uniquely identifies a persisted (or to-be-persisted) document by its
/// mapped type tag and identifier value. Used as the identity map key and
/// as the payload of [Value::Ref] link fields.
///
/// # Characteristics
/// - **Value equality**: Two refs are equal when type tag and identifier
///   compare equal; identifier comparison follows [Value] coercion rules
/// - **Hashable**: Usable as a map key
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentRef {
    type_tag: String,
    id: Box<Value>,
}

impl DocumentRef {
    /// Creates a new document reference.
    ///
    /// # Arguments
    /// * `type_tag` - The mapped type name (e.g., "Book")
    /// * `id` - The identifier field value
    pub fn new(type_tag: impl Into<String>, id: impl Into<Value>) -> Self {
        DocumentRef {
            type_tag: type_tag.into(),
            id: Box::new(id.into()),
        }
    }

    /// Returns the mapped type tag.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the identifier value.
    pub fn id(&self) -> &Value {
        &self.id
    }
}

impl Debug for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{:?}]", self.type_tag, self.id)
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Creates a [Document] from field-value pairs.
///
/// ```rust,ignore
/// use docmap::doc;
///
/// let book = doc! {
///     "id" => 1i64,
///     "title" => "Rust in Action",
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::document::Document::new();
        $(
            doc.put($field, $value).expect("valid field name");
        )+
        doc
    }};
}
