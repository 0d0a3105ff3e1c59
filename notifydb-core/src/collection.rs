//! Query execution and mutations against one named collection.
//!
//! A [`Collection`] pairs a collection name with a [`StoreSession`]. It converts identifiers
//! at the boundary: callers pass identifiers in any accepted form and always get documents back
//! with their `_id` externalized.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::{collection::Collection, page::PageWindow, query::Sort};
//!
//! let session = backend.session().await?;
//! let messages = Collection::new("message", &session);
//!
//! let created = messages.insert(&doc! { "content": "hello" }).await?;
//! let page = messages
//!     .fetch_page(&doc! {}, PageWindow::new(1, 10)?, Sort::parse("createdAt", "desc"))
//!     .await?;
//! ```

use bson::{Bson, Document, doc};
use tracing::{debug, error};

use crate::{
    backend::StoreSession,
    document::{ID_FIELD, externalize, generate_id, is_missing_id, normalize_id, strip_id},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{PageWindow, PagedResult},
    query::{FindOptions, Sort},
};

/// Name of the index every collection carries on `_id`. It can never be dropped.
pub const PRIMARY_INDEX: &str = "_id_";

/// A named collection bound to a store session.
#[derive(Debug)]
pub struct Collection<S: StoreSession> {
    name: String,
    session: S,
}

impl<S: StoreSession> Collection<S> {
    pub fn new(name: impl Into<String>, session: S) -> Self {
        Self {
            name: name.into(),
            session,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches one page of documents matching a native filter.
    ///
    /// The total is counted first, then at most `window.limit()` documents are fetched after
    /// skipping `window.offset()`, ordered by `sort` when given.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Store`] if either store call fails.
    pub async fn fetch_page(
        &self,
        filter: &Document,
        window: PageWindow,
        sort: Option<Sort>,
    ) -> DocumentStoreResult<PagedResult<Document>> {
        let total = self
            .session
            .count_documents(&self.name, filter)
            .await
            .inspect_err(|err| self.log_failure("count", err))?;

        let options = FindOptions::page(&window, sort);
        let limit = usize::try_from(window.limit()).unwrap_or(usize::MAX);
        let items: Vec<Document> = self
            .session
            .find_documents(&self.name, filter, &options)
            .await
            .inspect_err(|err| self.log_failure("find", err))?
            .iter()
            .take(limit)
            .map(externalize)
            .collect();

        debug!(
            operation = "fetch_page",
            collection = %self.name,
            total,
            page = window.page(),
            returned = items.len(),
            "fetched page"
        );

        Ok(PagedResult::new(window.paginate(total), items))
    }

    /// Fetches every document matching a native filter, in natural order.
    ///
    /// There is no bound on the result size.
    pub async fn fetch_all(&self, filter: &Document) -> DocumentStoreResult<Vec<Document>> {
        let documents = self
            .session
            .find_documents(&self.name, filter, &FindOptions::all())
            .await
            .inspect_err(|err| self.log_failure("find", err))?;

        debug!(
            operation = "fetch_all",
            collection = %self.name,
            returned = documents.len(),
            "fetched documents"
        );

        Ok(documents.iter().map(externalize).collect())
    }

    /// Inserts a copy of `document`, assigning an identifier when it has none.
    ///
    /// A present identifier is normalized to its native form first. Returns the stored document
    /// with its identifier externalized.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifierFormat`] or
    /// [`DocumentStoreError::UnsupportedIdentifierType`] for a bad identifier, and the store's
    /// error if the insert fails.
    pub async fn insert(&self, document: &Document) -> DocumentStoreResult<Document> {
        let id = match document.get(ID_FIELD) {
            value if is_missing_id(value) => generate_id(),
            Some(value) => normalize_id(value.clone())?,
            None => generate_id(),
        };

        let mut stored = document.clone();
        stored.insert(ID_FIELD, id);

        self.session
            .insert_document(&self.name, stored.clone())
            .await
            .inspect_err(|err| self.log_failure("insert", err))?;

        debug!(operation = "insert", collection = %self.name, id = %id, "inserted document");

        Ok(externalize(&stored))
    }

    /// Fetches one document by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when no document has the identifier.
    pub async fn find_by_id(&self, id: impl Into<Bson>) -> DocumentStoreResult<Document> {
        let id = normalize_id(id)?;

        let document = self
            .session
            .find_by_id(&self.name, id)
            .await
            .inspect_err(|err| self.log_failure("find_by_id", err))?
            .ok_or_else(|| DocumentStoreError::not_found(&self.name, id))?;

        Ok(externalize(&document))
    }

    /// Removes one document by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing was removed.
    pub async fn delete_by_id(&self, id: impl Into<Bson>) -> DocumentStoreResult<()> {
        let id = normalize_id(id)?;

        let deleted = self
            .session
            .delete_by_id(&self.name, id)
            .await
            .inspect_err(|err| self.log_failure("delete_by_id", err))?;

        if !deleted {
            return Err(DocumentStoreError::not_found(&self.name, id));
        }

        debug!(operation = "delete_by_id", collection = %self.name, id = %id, "deleted document");
        Ok(())
    }

    /// Replaces the whole body of one document. Any `_id` in `update` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when no document has the identifier.
    pub async fn update_by_id(&self, id: impl Into<Bson>, update: &Document) -> DocumentStoreResult<()> {
        let id = normalize_id(id)?;

        let replaced = self
            .session
            .replace_by_id(&self.name, id, strip_id(update))
            .await
            .inspect_err(|err| self.log_failure("update_by_id", err))?;

        if !replaced {
            return Err(DocumentStoreError::not_found(&self.name, id));
        }

        debug!(operation = "update_by_id", collection = %self.name, id = %id, "replaced document");
        Ok(())
    }

    /// Merges `update` into every document matching `selector`. Any `_id` in `update` is
    /// ignored.
    ///
    /// Returns the number of matched documents.
    pub async fn update_by_filter(&self, selector: &Document, update: &Document) -> DocumentStoreResult<u64> {
        let matched = self
            .session
            .update_many(&self.name, selector, strip_id(update))
            .await
            .inspect_err(|err| self.log_failure("update_by_filter", err))?;

        debug!(operation = "update_by_filter", collection = %self.name, matched, "updated documents");
        Ok(matched)
    }

    /// Creates an ascending index on `field` and returns its name.
    pub async fn create_index(&self, field: &str, unique: bool) -> DocumentStoreResult<String> {
        self.session
            .create_index(&self.name, field, unique)
            .await
            .inspect_err(|err| self.log_failure("create_index", err))
    }

    /// Lists every index name of the collection.
    pub async fn list_indexes(&self) -> DocumentStoreResult<Vec<String>> {
        self.session
            .list_indexes(&self.name)
            .await
            .inspect_err(|err| self.log_failure("list_indexes", err))
    }

    /// Drops every index except the primary `_id_` index and returns the dropped names.
    pub async fn drop_indexes(&self) -> DocumentStoreResult<Vec<String>> {
        let mut dropped = Vec::new();

        for name in self.list_indexes().await? {
            if name == PRIMARY_INDEX {
                continue;
            }

            self.session
                .drop_index(&self.name, &name)
                .await
                .inspect_err(|err| self.log_failure("drop_index", err))?;
            dropped.push(name);
        }

        debug!(operation = "drop_indexes", collection = %self.name, dropped = ?dropped, "dropped indexes");
        Ok(dropped)
    }

    fn log_failure(&self, operation: &'static str, err: &DocumentStoreError) {
        error!(operation, collection = %self.name, error = %err, "store operation failed");
    }
}

/// Wraps a `$set` update around a document body.
pub fn set_update(fields: Document) -> Document {
    doc! { "$set": fields }
}
