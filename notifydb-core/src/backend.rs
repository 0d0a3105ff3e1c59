//! Storage backend abstraction for the document store.
//!
//! A backend is split in three layers:
//!
//! - [`StoreBackendBuilder`] establishes a connection. It is kept by the
//!   [`DocumentStore`](crate::store::DocumentStore) so the connection can be re-established
//!   after [`close_connection`](crate::store::DocumentStore::close_connection).
//! - [`StoreBackend`] is the shared connection handle. It hands out sessions.
//! - [`StoreSession`] is a lightweight handle used for exactly one logical operation. Sessions
//!   release whatever they hold when dropped, so they are released on success, on error and
//!   during unwinding alike.
//!
//! All filters are native [`Document`] predicates. Identifiers are native [`ObjectId`] values;
//! converting them from and to their external form is the caller's job.
//!
//! # Examples
//!
//! ```ignore
//! use notifydb_core::backend::{StoreBackend, StoreBackendBuilder, StoreSession};
//! use bson::doc;
//!
//! let backend = MyBackendBuilder::default().build().await?;
//! let session = backend.session().await?;
//! let total = session.count_documents("message", &doc! { "seen": false }).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, query::FindOptions};

/// Operations available on a single store session.
///
/// # Thread Safety
///
/// Sessions are `Send + Sync` and every operation takes `&self`, so a session can be shared
/// by the futures of one logical operation.
///
/// # Error Handling
///
/// Implementers map driver failures to
/// [`DocumentStoreError::Store`](crate::error::DocumentStoreError::Store) with the operation
/// and collection name, and report a lost connection as
/// [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection).
#[async_trait]
pub trait StoreSession: Send + Sync + Debug {
    /// Counts the documents of `collection` matching `filter`.
    async fn count_documents(&self, collection: &str, filter: &Document) -> DocumentStoreResult<u64>;

    /// Returns the documents of `collection` matching `filter`, ordered and sliced per `options`.
    ///
    /// Implementations must never return more than `options.limit` documents.
    async fn find_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Persists a new document. The document already carries its native `_id`.
    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<()>;

    /// Fetches the document with the given identifier, if any.
    async fn find_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<Option<Document>>;

    /// Replaces the whole body of the document with the given identifier.
    ///
    /// `document` never carries an `_id`; the stored identifier is kept. Returns `false` when no
    /// document matched.
    async fn replace_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> DocumentStoreResult<bool>;

    /// Removes the document with the given identifier. Returns `false` when no document matched.
    async fn delete_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<bool>;

    /// Merges `set` into every document matching `selector` (a `$set` update).
    ///
    /// Returns the number of matched documents.
    async fn update_many(
        &self,
        collection: &str,
        selector: &Document,
        set: Document,
    ) -> DocumentStoreResult<u64>;

    /// Creates an ascending single-field index and returns its name.
    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<String>;

    /// Lists the index names of a collection, including the mandatory `_id_` index.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>>;

    /// Drops one index by name.
    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<S> StoreSession for &S
where
    S: StoreSession,
{
    async fn count_documents(&self, collection: &str, filter: &Document) -> DocumentStoreResult<u64> {
        (*self).count_documents(collection, filter).await
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .find_documents(collection, filter, options)
            .await
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        (*self).insert_document(collection, document).await
    }

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<Option<Document>> {
        (*self).find_by_id(collection, id).await
    }

    async fn replace_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        (*self)
            .replace_by_id(collection, id, document)
            .await
    }

    async fn delete_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<bool> {
        (*self).delete_by_id(collection, id).await
    }

    async fn update_many(
        &self,
        collection: &str,
        selector: &Document,
        set: Document,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .update_many(collection, selector, set)
            .await
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<String> {
        (*self)
            .create_index(collection, field, unique)
            .await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        (*self).list_indexes(collection).await
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_index(collection, name).await
    }
}

/// A shared connection to a backing store.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    type Session: StoreSession;

    /// Acquires a session for one logical operation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection)
    /// when no session can be established.
    async fn session(&self) -> DocumentStoreResult<Self::Session>;

    /// Cleanly shuts down the connection, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for [`StoreBackend`] connections.
///
/// Building takes `&self` so the same builder can reconnect after a close.
#[async_trait]
pub trait StoreBackendBuilder: Send + Sync {
    type Backend: StoreBackend;

    async fn build(&self) -> DocumentStoreResult<Self::Backend>;
}
