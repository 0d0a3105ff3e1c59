//! Main document store interface.
//!
//! [`DocumentStore`] owns a backend builder and the one shared connection it produces. The
//! connection is established lazily by the first operation and can be closed and re-opened.
//! Every operation acquires its own session, which is released when the operation returns.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::store::DocumentStore;
//!
//! let store = DocumentStore::new(InMemoryStore::builder());
//!
//! let created = store.add_new_item("message", &doc! { "content": "hi", "actorID": 7 }).await?;
//! let page = store
//!     .get_all_items("message", 10, 1, "desc", "createdAt", &doc! { "actorid": "7" })
//!     .await?;
//! ```

use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{fmt, sync::Arc};
use tracing::{error, info, warn};

use crate::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    config::StoreOptions,
    error::DocumentStoreResult,
    filter::{EntityKind, FilterNormalizer},
    page::{PageWindow, PagedResult},
    query::Sort,
};

/// The caller-facing document store.
///
/// # Type Parameters
///
/// * `C` - The builder used to establish (and re-establish) the backend connection
pub struct DocumentStore<C: StoreBackendBuilder> {
    builder: C,
    options: StoreOptions,
    normalizer: FilterNormalizer,
    connection: RwLock<Option<Arc<C::Backend>>>,
}

impl<C: StoreBackendBuilder> fmt::Debug for DocumentStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: StoreBackendBuilder> DocumentStore<C> {
    /// Creates a store with default [`StoreOptions`]. No connection is made yet.
    pub fn new(builder: C) -> Self {
        Self::with_options(builder, StoreOptions::default())
    }

    pub fn with_options(builder: C, options: StoreOptions) -> Self {
        Self {
            builder,
            normalizer: FilterNormalizer::new(options.coercion),
            options,
            connection: RwLock::new(None),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Returns the shared connection, establishing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection)
    /// when the backend cannot be reached.
    pub async fn get_connection(&self) -> DocumentStoreResult<Arc<C::Backend>> {
        if let Some(backend) = self.connection.read().await.as_ref() {
            return Ok(Arc::clone(backend));
        }

        let mut connection = self.connection.write().await;
        if let Some(backend) = connection.as_ref() {
            return Ok(Arc::clone(backend));
        }

        let backend = self
            .builder
            .build()
            .await
            .inspect_err(|err| error!(error = %err, "failed to connect to document store"))?;
        info!("connected to document store");

        let backend = Arc::new(backend);
        *connection = Some(Arc::clone(&backend));
        Ok(backend)
    }

    /// Returns true while a connection is established.
    pub async fn is_connecting(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Closes the shared connection, if any. The next operation reconnects.
    ///
    /// The backend is shut down once no in-flight operation still holds it.
    pub async fn close_connection(&self) -> DocumentStoreResult<()> {
        let Some(backend) = self.connection.write().await.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(backend) {
            Ok(backend) => backend.shutdown().await?,
            Err(_) => warn!("connection still in use, shutdown deferred to its last holder"),
        }

        info!("closed document store connection");
        Ok(())
    }

    /// Acquires a fresh session on the shared connection.
    pub async fn session(&self) -> DocumentStoreResult<<C::Backend as StoreBackend>::Session> {
        self.get_connection()
            .await?
            .session()
            .await
            .inspect_err(|err| error!(error = %err, "failed to acquire session"))
    }

    /// Fetches one page of messages. Filters are normalized with the message rules.
    ///
    /// `order_by` is the direction (`"desc"` in any case is descending) and `sort_by` the field;
    /// an empty `sort_by` keeps natural order.
    pub async fn get_all_items(
        &self,
        collection: &str,
        limit: i64,
        page: i64,
        order_by: &str,
        sort_by: &str,
        filters: &Document,
    ) -> DocumentStoreResult<PagedResult<Document>> {
        self.fetch_page(Some(EntityKind::Message), collection, limit, page, order_by, sort_by, filters)
            .await
    }

    /// Fetches one page, normalizing filters with the rules of the kind named by `key`.
    ///
    /// An unknown key applies no rules and passes every filter through.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_all_items_by_key(
        &self,
        collection: &str,
        limit: i64,
        page: i64,
        order_by: &str,
        sort_by: &str,
        filters: &Document,
        key: &str,
    ) -> DocumentStoreResult<PagedResult<Document>> {
        self.fetch_page(EntityKind::from_key(key), collection, limit, page, order_by, sort_by, filters)
            .await
    }

    /// Fetches every document of a small reference collection.
    ///
    /// Only `userdevicetoken` listings are filtered, to tokens bound to a user; see
    /// [`EntityKind::listing_filter`].
    pub async fn get_all_items_no_limit(&self, collection: &str, key: &str) -> DocumentStoreResult<Vec<Document>> {
        let filter = EntityKind::from_key(key)
            .map(|kind| kind.listing_filter())
            .unwrap_or_default();

        let session = self.session().await?;
        Collection::new(collection, &session)
            .fetch_all(&filter)
            .await
    }

    /// Inserts a new document and returns it with its externalized identifier.
    pub async fn add_new_item(&self, collection: &str, item: &Document) -> DocumentStoreResult<Document> {
        let session = self.session().await?;
        let collection = Collection::new(collection, &session);

        if self.options.drop_indexes_on_insert {
            let dropped = collection.drop_indexes().await?;
            warn!(
                collection = collection.name(),
                dropped = ?dropped,
                "dropped indexes before insert"
            );
        }

        collection.insert(item).await
    }

    pub async fn find_item_by_id(&self, collection: &str, id: impl Into<Bson>) -> DocumentStoreResult<Document> {
        let session = self.session().await?;
        Collection::new(collection, &session).find_by_id(id).await
    }

    pub async fn remove_item_by_id(&self, collection: &str, id: impl Into<Bson>) -> DocumentStoreResult<()> {
        let session = self.session().await?;
        Collection::new(collection, &session).delete_by_id(id).await
    }

    /// Replaces the body of one document. The stored identifier never changes.
    pub async fn update_by_id(
        &self,
        collection: &str,
        id: impl Into<Bson>,
        update: &Document,
    ) -> DocumentStoreResult<()> {
        let session = self.session().await?;
        Collection::new(collection, &session)
            .update_by_id(id, update)
            .await
    }

    /// Merges `update` into every document matching the native `selector`.
    pub async fn update_by(&self, collection: &str, selector: &Document, update: &Document) -> DocumentStoreResult<u64> {
        let session = self.session().await?;
        Collection::new(collection, &session)
            .update_by_filter(selector, update)
            .await
    }

    pub async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<String> {
        let session = self.session().await?;
        Collection::new(collection, &session)
            .create_index(field, unique)
            .await
    }

    pub async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let session = self.session().await?;
        Collection::new(collection, &session).list_indexes().await
    }

    /// Drops every secondary index of a collection and returns the dropped names.
    pub async fn drop_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let session = self.session().await?;
        Collection::new(collection, &session).drop_indexes().await
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_page(
        &self,
        kind: Option<EntityKind>,
        collection: &str,
        limit: i64,
        page: i64,
        order_by: &str,
        sort_by: &str,
        filters: &Document,
    ) -> DocumentStoreResult<PagedResult<Document>> {
        let window = PageWindow::new(page, limit)?;
        let filter = self.normalizer.normalize(kind, filters)?;

        let session = self.session().await?;
        Collection::new(collection, &session)
            .fetch_page(&filter, window, Sort::parse(sort_by, order_by))
            .await
    }
}
