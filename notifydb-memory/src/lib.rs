//! In-memory document storage backend for notifydb.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates native filter documents itself and is meant for development, tests and
//! small single-process deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Native filters** - Equality, comparison, membership, existence and logical operators
//! - **Sorting and windowing** - Sort by any (dotted) field, skip and limit
//! - **Session tracking** - [`InMemoryStore::open_sessions`] shows sessions not yet released
//!
//! # Quick Start
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::store::DocumentStore;
//! use notifydb_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder());
//!
//!     let created = store.add_new_item("message", &doc! { "content": "hello" }).await?;
//!     let id = created.get_str("_id")?;
//!     let found = store.find_item_by_id("message", id).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as notifydb_memory;

pub mod evaluator;
pub mod store;

pub use evaluator::FilterError;
pub use store::{InMemorySession, InMemoryStore, InMemoryStoreBuilder};
