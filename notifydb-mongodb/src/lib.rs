//! MongoDB backend implementation for notifydb.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on the
//! official async driver. Native filters produced by the filter normalizer are handed to the
//! server untouched.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! notifydb = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Connections are described either by a connection string or by a
//! [`DatabaseConfig`](notifydb_core::config::DatabaseConfig). Building the backend pings the
//! deployment, so unreachable servers and rejected credentials surface as
//! [`DocumentStoreError::Connection`](notifydb_core::error::DocumentStoreError::Connection).
//!
//! # Example
//!
//! ```ignore
//! use notifydb::{config::DatabaseConfig, mongodb::MongoDbStoreBuilder, store::DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let store = DocumentStore::new(MongoDbStoreBuilder::from_config(&config));
//!     store.get_connection().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as notifydb_mongodb;

pub mod store;

pub use store::{MongoDbSession, MongoDbStore, MongoDbStoreBuilder};
