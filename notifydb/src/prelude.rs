//! Convenient re-exports of commonly used types from notifydb.
//!
//! ```ignore
//! use notifydb::prelude::*;
//! ```

pub use notifydb_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoreSession},
    collection::Collection,
    config::{DatabaseConfig, StoreOptions},
    document::{externalize, generate_id, normalize_id},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{CoercionPolicy, EntityKind, FilterNormalizer},
    page::{PageWindow, PagedResult, Pagination},
    query::{Sort, SortDirection},
    store::DocumentStore,
};
