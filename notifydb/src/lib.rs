//! Main notifydb crate providing a uniform CRUD-plus-pagination interface over a document store.
//!
//! This crate is the primary entry point. It re-exports the core types from the sub-crates and
//! provides access to the storage backends.
//!
//! # Features
//!
//! - **Dynamic filter normalization** - Client filter keys per entity kind become typed native predicates
//! - **Paged results** - Page metadata computed from the total count and a validated page window
//! - **Stable identifiers** - Native object ids are always returned as 24-character hex strings
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait set
//!
//! # Quick Start
//!
//! ```ignore
//! use notifydb::{prelude::*, memory::InMemoryStore, bson::doc};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder());
//!
//!     store
//!         .add_new_item("message", &doc! { "content": "hi", "actorID": 7, "seenAt": 0, "createdAt": 1 })
//!         .await?;
//!
//!     // Client keys are lower-case strings; they are coerced to the native fields.
//!     let page = store
//!         .get_all_items("message", 10, 1, "desc", "createdAt", &doc! { "actorid": "7" })
//!         .await?;
//!
//!     println!("{}", page.to_json()?);
//!
//!     store.close_connection().await
//! }
//! ```
//!
//! # Coercion policy
//!
//! By default a filter value that cannot be coerced (for example `actorid=abc`) fails the whole
//! request with [`DocumentStoreError::InvalidFilterValue`](error::DocumentStoreError::InvalidFilterValue).
//! Use [`StoreOptions`](config::StoreOptions) with
//! [`CoercionPolicy::Lenient`](filter::CoercionPolicy::Lenient) to drop such keys instead:
//!
//! ```ignore
//! use notifydb::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::with_options(
//!     InMemoryStore::builder(),
//!     StoreOptions::new().with_coercion(CoercionPolicy::Lenient),
//! );
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use notifydb_core::{backend, collection, config, document, error, filter, page, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use notifydb_memory::{FilterError, InMemorySession, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use notifydb_mongodb::{MongoDbSession, MongoDbStore, MongoDbStoreBuilder};
}
