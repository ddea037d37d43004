//! Dirty checking: diffing live field values against persisted snapshots.

use crate::common::Value;
use crate::document::DocumentRef;
use crate::errors::DocmapResult;
use crate::mapping::{FieldKind, MetadataProvider};
use crate::unit_of_work::TrackedEntity;
use indexmap::IndexMap;
use itertools::{EitherOrBoth, Itertools};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The old and new value of one changed field.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldChange {
    old: Value,
    new: Value,
}

impl FieldChange {
    pub fn new(old: Value, new: Value) -> Self {
        FieldChange { old, new }
    }

    /// Returns the last-known-persisted value.
    pub fn old(&self) -> &Value {
        &self.old
    }

    /// Returns the current live value.
    pub fn new_value(&self) -> &Value {
        &self.new
    }
}

impl Debug for FieldChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -> {:?}", self.old, self.new)
    }
}

/// Field-level differences of one tracked entity.
///
/// # Purpose
/// Maps field name to [FieldChange] in mapped field order. An empty change
/// set means the entity is clean and no update is dispatched for it.
#[derive(Clone, PartialEq, Eq)]
pub struct ChangeSet {
    doc_ref: DocumentRef,
    changes: IndexMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn new(doc_ref: DocumentRef) -> Self {
        ChangeSet {
            doc_ref,
            changes: IndexMap::new(),
        }
    }

    /// Returns the identity of the diffed entity.
    pub fn doc_ref(&self) -> &DocumentRef {
        &self.doc_ref
    }

    pub(crate) fn record(&mut self, field: impl Into<String>, change: FieldChange) {
        self.changes.insert(field.into(), change);
    }

    /// Returns `true` if no field differs — the entity is clean.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of changed fields.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns the changed field names in mapped order.
    pub fn fields(&self) -> Vec<String> {
        self.changes.keys().cloned().collect()
    }

    /// Returns the change for a field, if that field differs.
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Iterates over `(field, change)` pairs in mapped order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.changes.iter()
    }
}

impl Debug for ChangeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangeSet({}, ", self.doc_ref)?;
        f.debug_map().entries(self.changes.iter()).finish()?;
        write!(f, ")")
    }
}

/// Computes change sets by comparing live values against snapshots.
///
/// # Purpose
/// For each mapped field of an entity, compares the current live value to the
/// snapshot value using per-field equality appropriate to its declared kind:
///
/// - [FieldKind::Scalar]: scalar [Value] equality
/// - [FieldKind::Embedded]: deep structural equality of embedded documents
/// - [FieldKind::Reference]: equality by [DocumentRef]
/// - [FieldKind::ReferenceList]: element-wise, order-sensitive comparison —
///   an append-only or reorder-only change still counts as changed
///
/// A missing snapshot (never-persisted entity) makes every mapped field count
/// as changed, with [Value::Null] as the old value.
#[derive(Clone)]
pub struct ChangeSetComputer {
    metadata: Arc<dyn MetadataProvider>,
}

impl ChangeSetComputer {
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        ChangeSetComputer { metadata }
    }

    /// Computes the change set of a tracked entity.
    ///
    /// Reads the snapshot but never writes it; snapshots move only at commit
    /// boundaries.
    pub fn compute_change_set(&self, entity: &TrackedEntity) -> DocmapResult<ChangeSet> {
        let doc_ref = entity.doc_ref().clone();
        let fields = self.metadata.fields_of(doc_ref.type_tag())?;
        let live = entity.document();
        let snapshot = entity.snapshot();

        let mut change_set = ChangeSet::new(doc_ref);
        for spec in &fields {
            let current = live.get(spec.name());
            match &snapshot {
                None => {
                    // Never persisted: every mapped field counts as changed.
                    change_set.record(spec.name(), FieldChange::new(Value::Null, current));
                }
                Some(snapshot) => {
                    let previous = snapshot.get(spec.name());
                    if !values_equal(spec.kind(), &previous, &current) {
                        change_set.record(spec.name(), FieldChange::new(previous, current));
                    }
                }
            }
        }
        Ok(change_set)
    }
}

/// Compares two field values under the declared field kind.
fn values_equal(kind: &FieldKind, a: &Value, b: &Value) -> bool {
    match kind {
        FieldKind::Scalar | FieldKind::Embedded => a == b,
        FieldKind::Reference { .. } => match (a, b) {
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => a == b,
        },
        FieldKind::ReferenceList { .. } => match (a, b) {
            (Value::Array(a), Value::Array(b)) => a
                .iter()
                .zip_longest(b.iter())
                .all(|pair| matches!(pair, EitherOrBoth::Both(x, y) if x == y)),
            _ => a == b,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::document::Document;
    use crate::mapping::{EntityMapping, MappingRegistry};

    fn registry() -> Arc<MappingRegistry> {
        let registry = MappingRegistry::new();
        registry
            .register(
                EntityMapping::builder("Book")
                    .id_field("id")
                    .scalar("title")
                    .embedded("meta")
                    .reference("author", "Author", true)
                    .reference_list("related", "Book", false)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn computer() -> ChangeSetComputer {
        ChangeSetComputer::new(registry())
    }

    fn managed_book() -> TrackedEntity {
        let doc = doc! {
            "id" => 1i64,
            "title" => "Dune",
            "author" => DocumentRef::new("Author", 7i64),
        };
        TrackedEntity::hydrated(DocumentRef::new("Book", 1i64), doc)
    }

    #[test]
    fn clean_entity_has_empty_change_set() {
        let entity = managed_book();
        let change_set = computer().compute_change_set(&entity).unwrap();
        assert!(change_set.is_empty());
    }

    #[test]
    fn scalar_mutation_yields_exactly_that_field() {
        let entity = managed_book();
        entity.set("title", "Dune Messiah").unwrap();

        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.fields(), vec!["title"]);

        let change = change_set.get("title").unwrap();
        assert_eq!(change.old(), &Value::from("Dune"));
        assert_eq!(change.new_value(), &Value::from("Dune Messiah"));
    }

    #[test]
    fn mutate_and_revert_yields_empty_change_set() {
        let entity = managed_book();
        entity.set("title", "Dune Messiah").unwrap();
        entity.set("title", "Dune").unwrap();

        let change_set = computer().compute_change_set(&entity).unwrap();
        assert!(change_set.is_empty());
    }

    #[test]
    fn missing_snapshot_counts_every_field_changed() {
        let doc = doc! { "id" => 1i64, "title" => "Dune" };
        let entity = TrackedEntity::new_entity(DocumentRef::new("Book", 1i64), doc);

        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.len(), 5);
        let change = change_set.get("title").unwrap();
        assert_eq!(change.old(), &Value::Null);
        assert_eq!(change.new_value(), &Value::from("Dune"));
    }

    #[test]
    fn reference_change_detected_by_identity() {
        let entity = managed_book();
        entity
            .set("author", DocumentRef::new("Author", 8i64))
            .unwrap();

        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.fields(), vec!["author"]);
    }

    #[test]
    fn embedded_document_compared_structurally() {
        let mut meta = Document::new();
        meta.put("pages", 412i64).unwrap();

        let doc = doc! { "id" => 1i64, "meta" => meta.clone() };
        let entity = TrackedEntity::hydrated(DocumentRef::new("Book", 1i64), doc);

        // Structurally equal replacement document: still clean.
        let mut same = Document::new();
        same.put("pages", 412i64).unwrap();
        entity.set("meta", same).unwrap();
        assert!(computer().compute_change_set(&entity).unwrap().is_empty());

        let mut different = meta;
        different.put("pages", 500i64).unwrap();
        entity.set("meta", different).unwrap();
        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.fields(), vec!["meta"]);
    }

    #[test]
    fn reference_list_append_counts_as_changed() {
        let r1 = Value::Ref(DocumentRef::new("Book", 2i64));
        let r2 = Value::Ref(DocumentRef::new("Book", 3i64));

        let doc = doc! { "id" => 1i64, "related" => vec![r1.clone()] };
        let entity = TrackedEntity::hydrated(DocumentRef::new("Book", 1i64), doc);

        entity.set("related", vec![r1, r2]).unwrap();
        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.fields(), vec!["related"]);
    }

    #[test]
    fn reference_list_reorder_counts_as_changed() {
        let r1 = Value::Ref(DocumentRef::new("Book", 2i64));
        let r2 = Value::Ref(DocumentRef::new("Book", 3i64));

        let doc = doc! { "id" => 1i64, "related" => vec![r1.clone(), r2.clone()] };
        let entity = TrackedEntity::hydrated(DocumentRef::new("Book", 1i64), doc);

        entity.set("related", vec![r2, r1]).unwrap();
        let change_set = computer().compute_change_set(&entity).unwrap();
        assert_eq!(change_set.fields(), vec!["related"]);
    }

    #[test]
    fn unmapped_live_fields_are_ignored() {
        let entity = managed_book();
        entity.set("scratch", "not mapped").unwrap();

        let change_set = computer().compute_change_set(&entity).unwrap();
        assert!(change_set.is_empty());
    }

    #[test]
    fn unset_field_reads_as_null_change() {
        let entity = managed_book();
        entity.unset("title");

        let change_set = computer().compute_change_set(&entity).unwrap();
        let change = change_set.get("title").unwrap();
        assert_eq!(change.new_value(), &Value::Null);
    }
}
