use crate::document::{Document, DocumentRef};
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Compare two floats for equality with proper NaN handling.
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Represents a mapped field value. It can be a simple value like [Value::I64],
/// [Value::String] or a complex value like [Value::Document] or [Value::Array].
///
/// # Purpose
/// Provides a unified representation for all value types that a mapped document
/// field can hold. Supports native Rust scalars, embedded documents, arrays, and
/// links to other documents via [Value::Ref].
///
/// # Variants
/// - Null: Absence of a value
/// - Bool(bool): Boolean true/false
/// - I32/I64/U64: Integer types
/// - F64: 64-bit floating point
/// - String(String): Text value
/// - Bytes(Vec<u8>): Binary data
/// - Array(Vec<Value>): Ordered collection of values
/// - Document(Document): Embedded document
/// - Ref(DocumentRef): Link to another mapped document, compared by identity
///
/// # Characteristics
/// - **Comparable**: Integer variants compare across widths; NaN equals NaN
/// - **Hashable**: Hashing agrees with the coercing equality, so values can key maps
/// - **Serializable**: Optional serde support behind the `serde` feature
/// - **Default**: Defaults to Null
///
/// # Usage
/// Create values using the From trait:
/// ```text
/// let v1: Value = 42i64.into();
/// let v2 = Value::from("hello");
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents an unsigned 64-bit integer value.
    U64(u64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a byte array value.
    Bytes(Vec<u8>),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents an embedded document value.
    Document(Document),
    /// Represents a link to another document, identified by its [DocumentRef].
    Ref(DocumentRef),
}

impl Value {
    /// Returns `true` if the value is an integer of any width.
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::U64(_))
    }

    /// Returns `true` if the value is a floating point number.
    pub fn is_decimal(&self) -> bool {
        matches!(self, Value::F64(_))
    }

    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer value widened to `i128`, if this is an integer.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I32(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Returns the floating point value, if this is a decimal.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a [Value::Bool].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is a [Value::String].
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array elements, if this is a [Value::Array].
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the embedded document, if this is a [Value::Document].
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the document reference, if this is a [Value::Ref].
    pub fn as_ref_value(&self) -> Option<&DocumentRef> {
        match self {
            Value::Ref(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_integer() && other.is_integer() {
            if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
                return a == b;
            }
        }

        if self.is_decimal() && other.is_decimal() {
            if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
                return num_eq_float(a, b);
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hashing must agree with the coercing equality above: all integer
        // widths hash through i128, NaN canonicalizes to a single bit pattern,
        // and embedded documents hash their entries in sorted key order.
        match self {
            Value::Null => state.write_u8(0),
            Value::Bool(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Value::I32(_) | Value::I64(_) | Value::U64(_) => {
                state.write_u8(2);
                // is_integer guarantees as_integer is Some for these variants
                self.as_integer().unwrap_or_default().hash(state);
            }
            Value::F64(v) => {
                state.write_u8(3);
                let bits = if v.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    v.to_bits()
                };
                bits.hash(state);
            }
            Value::String(v) => {
                state.write_u8(4);
                v.hash(state);
            }
            Value::Bytes(v) => {
                state.write_u8(5);
                v.hash(state);
            }
            Value::Array(v) => {
                state.write_u8(6);
                for item in v {
                    item.hash(state);
                }
            }
            Value::Document(doc) => {
                state.write_u8(7);
                let mut entries: Vec<_> = doc.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                for (field, value) in entries {
                    field.hash(state);
                    value.hash(state);
                }
            }
            Value::Ref(doc_ref) => {
                state.write_u8(8);
                doc_ref.hash(state);
            }
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "bytes[{}]", v.len()),
            Value::Array(v) => f.debug_list().entries(v.iter()).finish(),
            Value::Document(v) => write!(f, "{:?}", v),
            Value::Ref(v) => write!(f, "ref({:?})", v),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<DocumentRef> for Value {
    fn from(v: DocumentRef) -> Self {
        Value::Ref(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn integer_equality_coerces_across_widths() {
        assert_eq!(Value::I32(42), Value::I64(42));
        assert_eq!(Value::I64(42), Value::U64(42));
        assert_ne!(Value::I32(42), Value::I64(43));
    }

    #[test]
    fn integer_hash_agrees_with_equality() {
        assert_eq!(hash_of(&Value::I32(7)), hash_of(&Value::I64(7)));
        assert_eq!(hash_of(&Value::I64(7)), hash_of(&Value::U64(7)));
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_eq!(
            hash_of(&Value::F64(f64::NAN)),
            hash_of(&Value::F64(-f64::NAN))
        );
    }

    #[test]
    fn integer_and_decimal_are_distinct() {
        assert_ne!(Value::I64(1), Value::F64(1.0));
    }

    #[test]
    fn null_is_default() {
        assert_eq!(Value::default(), Value::Null);
        assert!(Value::default().is_null());
    }

    #[test]
    fn array_equality_is_order_sensitive() {
        let a = Value::Array(vec![Value::I64(1), Value::I64(2)]);
        let b = Value::Array(vec![Value::I64(2), Value::I64(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn ref_values_compare_by_document_ref() {
        let r1 = Value::Ref(DocumentRef::new("Author", Value::I64(1)));
        let r2 = Value::Ref(DocumentRef::new("Author", Value::I64(1)));
        let r3 = Value::Ref(DocumentRef::new("Author", Value::I64(2)));
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
    }

    #[test]
    fn accessors_return_matching_types() {
        assert_eq!(Value::I32(5).as_integer(), Some(5));
        assert_eq!(Value::F64(2.5).as_decimal(), Some(2.5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_string(), Some("hi"));
        assert!(Value::Null.as_integer().is_none());
        assert!(Value::Null.as_string().is_none());
    }

    #[test]
    fn from_option_maps_none_to_null() {
        let some: Value = Some(3i64).into();
        let none: Value = Option::<i64>::None.into();
        assert_eq!(some, Value::I64(3));
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn document_hash_ignores_field_order() {
        let mut d1 = Document::new();
        d1.put("a", 1i64).unwrap();
        d1.put("b", 2i64).unwrap();
        let mut d2 = Document::new();
        d2.put("b", 2i64).unwrap();
        d2.put("a", 1i64).unwrap();
        assert_eq!(Value::Document(d1.clone()), Value::Document(d2.clone()));
        assert_eq!(hash_of(&Value::Document(d1)), hash_of(&Value::Document(d2)));
    }
}
