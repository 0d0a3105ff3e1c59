//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON documents in ordered maps keyed by their object id, behind an
//! async-safe read-write lock. Natural order is identifier order, which follows insertion order
//! for generated ids.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use notifydb_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoreSession},
    collection::PRIMARY_INDEX,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindOptions, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

#[derive(Debug, Clone, PartialEq)]
struct IndexSpec {
    field: String,
    unique: bool,
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: BTreeMap<ObjectId, Document>,
    indexes: BTreeMap<String, IndexSpec>,
}

impl CollectionState {
    fn violates_unique(&self, candidate: &Document, skip: Option<ObjectId>) -> Option<&str> {
        self.indexes
            .iter()
            .filter(|(_, spec)| spec.unique)
            .find_map(|(name, spec)| {
                let value = lookup(candidate, &spec.field)?;
                let taken = self
                    .documents
                    .iter()
                    .filter(|(id, _)| Some(**id) != skip)
                    .any(|(_, existing)| {
                        lookup(existing, &spec.field)
                            .is_some_and(|other| Comparable::from(other) == Comparable::from(value))
                    });
                taken.then_some(name.as_str())
            })
    }
}

type StoreMap = HashMap<String, CollectionState>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Multiple clones of
/// the same instance share the same underlying data, so a store handed to a builder keeps its
/// documents across reconnects.
///
/// Queries scan every document of a collection. Indexes are recorded, and unique ones are
/// enforced, but they never speed anything up.
///
/// # Example
///
/// ```ignore
/// use notifydb_memory::InMemoryStore;
/// use notifydb_core::store::DocumentStore;
///
/// let backend = InMemoryStore::new();
/// let store = DocumentStore::new(InMemoryStore::builder().with_store(backend.clone()));
///
/// store.add_new_item("message", &bson::doc! { "content": "hi" }).await?;
/// assert_eq!(backend.open_sessions(), 0);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
    open_sessions: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of sessions acquired and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(AtomicOrdering::SeqCst)
    }

    /// Number of documents currently held in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, |state| state.documents.len())
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    type Session = InMemorySession;

    async fn session(&self) -> DocumentStoreResult<Self::Session> {
        self.open_sessions.fetch_add(1, AtomicOrdering::SeqCst);

        Ok(InMemorySession {
            store: self.clone(),
        })
    }
}

/// A session on an [`InMemoryStore`]. Dropping it releases the session.
#[derive(Debug)]
pub struct InMemorySession {
    store: InMemoryStore,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.store
            .open_sessions
            .fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn count_documents(&self, collection: &str, filter: &Document) -> DocumentStoreResult<u64> {
        let store = self.store.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(0);
        };

        let matched = DocumentEvaluator::filter_documents(state.documents.values(), filter)
            .map_err(|err| DocumentStoreError::store("count", collection, err))?;

        Ok(matched.len() as u64)
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = DocumentEvaluator::filter_documents(state.documents.values(), filter)
            .map_err(|err| DocumentStoreError::store("find", collection, err))?;

        // Apply sorting if specified
        if let Some(sort) = &options.sort {
            documents.sort_by(|a, b| {
                let left = lookup(a, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup(b, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            });
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(documents.into_iter().skip(skip).take(limit).collect())
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        let id = document
            .get_object_id(ID_FIELD)
            .map_err(|err| DocumentStoreError::store("insert", collection, err))?;

        let mut store = self.store.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        if state.documents.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists {
                collection: collection.to_string(),
                id: id.to_hex(),
            });
        }

        if let Some(index) = state.violates_unique(&document, None) {
            return Err(DocumentStoreError::store(
                "insert",
                collection,
                format!("duplicate key for unique index {index}"),
            ));
        }

        state.documents.insert(id, document);
        debug!(collection, id = %id, "stored document");

        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<Option<Document>> {
        Ok(self
            .store
            .store
            .read()
            .await
            .get(collection)
            .and_then(|state| state.documents.get(&id))
            .cloned())
    }

    async fn replace_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        let mut store = self.store.store.write().await;
        let Some(state) = store.get_mut(collection) else {
            return Ok(false);
        };

        if !state.documents.contains_key(&id) {
            return Ok(false);
        }

        let mut body = Document::new();
        body.insert(ID_FIELD, id);
        for (key, value) in document {
            body.insert(key, value);
        }

        if let Some(index) = state.violates_unique(&body, Some(id)) {
            return Err(DocumentStoreError::store(
                "replace",
                collection,
                format!("duplicate key for unique index {index}"),
            ));
        }

        state.documents.insert(id, body);
        Ok(true)
    }

    async fn delete_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<bool> {
        Ok(self
            .store
            .store
            .write()
            .await
            .get_mut(collection)
            .is_some_and(|state| state.documents.remove(&id).is_some()))
    }

    async fn update_many(
        &self,
        collection: &str,
        selector: &Document,
        set: Document,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.store.write().await;
        let Some(state) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = Vec::new();
        for (id, document) in &state.documents {
            if DocumentEvaluator::new(document)
                .matches(selector)
                .map_err(|err| DocumentStoreError::store("update", collection, err))?
            {
                matched.push(*id);
            }
        }

        for id in &matched {
            if let Some(document) = state.documents.get_mut(id) {
                for (path, value) in &set {
                    set_path(document, path, value.clone());
                }
            }
        }

        Ok(matched.len() as u64)
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<String> {
        let name = format!("{field}_1");
        let mut store = self.store.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        state.indexes.insert(
            name.clone(),
            IndexSpec {
                field: field.to_string(),
                unique,
            },
        );

        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.store.read().await;

        Ok(match store.get(collection) {
            Some(state) => std::iter::once(PRIMARY_INDEX.to_string())
                .chain(state.indexes.keys().cloned())
                .collect(),
            None => vec![],
        })
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        if name == PRIMARY_INDEX {
            return Err(DocumentStoreError::store("drop_index", collection, "cannot drop _id index"));
        }

        let mut store = self.store.store.write().await;
        let removed = store
            .get_mut(collection)
            .and_then(|state| state.indexes.remove(name));

        match removed {
            Some(_) => Ok(()),
            None => Err(DocumentStoreError::store("drop_index", collection, format!("index not found with name [{name}]"))),
        }
    }
}

/// Sets a possibly dotted path, creating intermediate documents as needed.
fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Building never fails and always returns a handle to the same underlying data, so closing
/// and re-opening a [`DocumentStore`](notifydb_core::store::DocumentStore) keeps every document.
///
/// # Example
///
/// ```ignore
/// use notifydb_memory::InMemoryStore;
/// use notifydb_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default, Debug, Clone)]
pub struct InMemoryStoreBuilder {
    store: InMemoryStore,
}

impl InMemoryStoreBuilder {
    /// Serves an existing store instead of a fresh one.
    pub fn with_store(mut self, store: InMemoryStore) -> Self {
        self.store = store;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(&self) -> DocumentStoreResult<Self::Backend> {
        Ok(self.store.clone())
    }
}
