//! Core of the notifydb document-store access layer.
//!
//! This crate provides:
//!
//! - **Identifier codec** ([`document`]) - Conversion between native object ids and their hex form
//! - **Filter normalization** ([`filter`]) - Per-entity-kind translation of client filter keys into native predicates
//! - **Pagination** ([`page`]) - Page windows, page metadata and the paged result contract
//! - **Sorting** ([`query`]) - Sort parsing and fetch options
//! - **Store backend abstraction** ([`backend`]) - Traits implemented by each storage adapter
//! - **Collections interface** ([`collection`]) - Query execution and mutations on one collection
//! - **Document store** ([`store`]) - The caller-facing API with connection lifecycle
//! - **Configuration** ([`config`]) - Connection settings and store options
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::store::DocumentStore;
//!
//! let store = DocumentStore::new(builder);
//! let page = store
//!     .get_all_items("message", 10, 1, "desc", "createdAt", &doc! { "seen": "false" })
//!     .await?;
//! println!("{}", page.to_json()?);
//! ```

#[allow(unused_extern_crates)]
extern crate self as notifydb_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod page;
pub mod query;
pub mod store;
