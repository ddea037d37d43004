use docmap::changeset::ChangeSet;
use docmap::errors::{DocmapError, DocmapResult, ErrorKind};
use docmap::persister::Persister;
use docmap::{Document, DocumentMapper, DocumentRef, EntityMapping, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-memory persister backing integration tests.
///
/// Inserts reject duplicate identities, updates apply only the changed fields
/// to the stored document, deletes reject unknown identities. A single
/// identity can be armed to fail, which lets tests exercise the fail-fast
/// partial commit path.
pub struct MemoryPersister {
    store: Mutex<HashMap<DocumentRef, Document>>,
    fail_on: Mutex<Option<DocumentRef>>,
}

impl MemoryPersister {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryPersister {
            store: Mutex::new(HashMap::new()),
            fail_on: Mutex::new(None),
        })
    }

    /// Arms the persister to fail the next operation targeting `doc_ref`.
    pub fn fail_on(&self, doc_ref: DocumentRef) {
        *self.fail_on.lock() = Some(doc_ref);
    }

    /// Disarms a previously armed failure.
    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    /// Returns the stored document for an identity, if present.
    pub fn stored(&self, doc_ref: &DocumentRef) -> Option<Document> {
        self.store.lock().get(doc_ref).cloned()
    }

    pub fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.store.lock().contains_key(doc_ref)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    fn check_armed(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        if self.fail_on.lock().as_ref() == Some(doc_ref) {
            return Err(DocmapError::new(
                &format!("Injected failure for {}", doc_ref),
                ErrorKind::Storage,
            ));
        }
        Ok(())
    }
}

impl Persister for MemoryPersister {
    fn insert(&self, doc_ref: &DocumentRef, fields: &Document) -> DocmapResult<()> {
        self.check_armed(doc_ref)?;
        let mut store = self.store.lock();
        if store.contains_key(doc_ref) {
            return Err(DocmapError::new(
                &format!("{} already exists", doc_ref),
                ErrorKind::Storage,
            ));
        }
        store.insert(doc_ref.clone(), fields.clone());
        Ok(())
    }

    fn update(&self, doc_ref: &DocumentRef, changes: &ChangeSet) -> DocmapResult<()> {
        self.check_armed(doc_ref)?;
        let mut store = self.store.lock();
        let document = store.get_mut(doc_ref).ok_or_else(|| {
            DocmapError::new(&format!("{} does not exist", doc_ref), ErrorKind::Storage)
        })?;
        for (field, change) in changes.iter() {
            match change.new_value() {
                Value::Null => {
                    document.remove(field);
                }
                value => {
                    document.put(field.clone(), value.clone())?;
                }
            }
        }
        Ok(())
    }

    fn delete(&self, doc_ref: &DocumentRef) -> DocmapResult<()> {
        self.check_armed(doc_ref)?;
        let mut store = self.store.lock();
        if store.remove(doc_ref).is_none() {
            return Err(DocmapError::new(
                &format!("{} does not exist", doc_ref),
                ErrorKind::Storage,
            ));
        }
        Ok(())
    }
}

/// The library domain shared by the integration tests: authors, books that
/// require an author, and self-referencing tags.
pub fn library_mappings() -> Vec<EntityMapping> {
    vec![
        EntityMapping::builder("Author")
            .id_field("id")
            .scalar("name")
            .embedded("address")
            .build()
            .expect("author mapping"),
        EntityMapping::builder("Book")
            .id_field("id")
            .scalar("title")
            .scalar("pages")
            .reference("author", "Author", true)
            .reference_list("related", "Book", false)
            .build()
            .expect("book mapping"),
        EntityMapping::builder("Tag")
            .id_field("id")
            .scalar("label")
            .reference("parent", "Tag", false)
            .build()
            .expect("tag mapping"),
    ]
}

/// Opens a mapper over the library mappings and a fresh in-memory persister.
pub fn create_test_mapper() -> (DocumentMapper, Arc<MemoryPersister>) {
    let persister = MemoryPersister::new();
    let mut builder = DocumentMapper::builder();
    for mapping in library_mappings() {
        builder = builder.mapping(mapping);
    }
    let mapper = builder
        .open(persister.clone())
        .expect("mapper should open");
    (mapper, persister)
}

pub fn author_ref(id: i64) -> DocumentRef {
    DocumentRef::new("Author", id)
}

pub fn book_ref(id: i64) -> DocumentRef {
    DocumentRef::new("Book", id)
}

pub fn tag_ref(id: i64) -> DocumentRef {
    DocumentRef::new("Tag", id)
}
