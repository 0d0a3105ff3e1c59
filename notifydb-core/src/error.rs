//! Error types and result types for document store operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`]. Failures are
//! never retried or swallowed by the core; each variant carries enough context (operation,
//! collection, identifier) for the caller to log or act on it.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The store is unreachable, or the connection or a session could not be established.
    #[error("Connection error: {0}")]
    Connection(String),
    /// An identifier string or byte sequence is not a valid object id.
    #[error("Invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),
    /// An identifier was supplied as a value type that cannot represent an object id.
    #[error("Unsupported identifier type: {0}")]
    UnsupportedIdentifierType(String),
    /// A filter value could not be coerced to the type its native field requires.
    #[error("Invalid value {value:?} for filter {key}: expected {expected}")]
    InvalidFilterValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    /// The requested page size is not strictly positive.
    #[error("Invalid page size: {0}")]
    InvalidPageSize(i64),
    /// The requested page number is not strictly positive, or its window overflows.
    #[error("Invalid page number: {0}")]
    InvalidPageNumber(i64),
    /// No document matched a single-document lookup, update or delete.
    #[error("Document {id} not found in collection {collection}")]
    NotFound { collection: String, id: String },
    /// A document with the given identifier already exists in the collection.
    #[error("Document {id} already exists in collection {collection}")]
    DocumentAlreadyExists { collection: String, id: String },
    /// Any other failure reported by the underlying store.
    #[error("Store error during {operation} on {collection}: {message}")]
    Store {
        operation: &'static str,
        collection: String,
        message: String,
    },
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DocumentStoreError {
    /// Builds a [`DocumentStoreError::Store`] from any displayable backend error.
    pub fn store(operation: &'static str, collection: &str, err: impl std::fmt::Display) -> Self {
        DocumentStoreError::Store {
            operation,
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    /// Builds a [`DocumentStoreError::NotFound`] for the given collection and identifier.
    pub fn not_found(collection: &str, id: impl std::fmt::Display) -> Self {
        DocumentStoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
