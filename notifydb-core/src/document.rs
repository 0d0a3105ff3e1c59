//! Identifier handling for stored documents.
//!
//! Documents are plain [`bson::Document`] values. Inside the store the `_id` field holds a
//! native [`ObjectId`]; at every external boundary it is replaced by the 24-character
//! hex string. This module converts between the two forms.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::document::{externalize, generate_id, normalize_id};
//!
//! let id = generate_id();
//! let external = externalize(&doc! { "_id": id, "content": "hello" });
//! let hex = external.get_str("_id").unwrap();
//! assert_eq!(normalize_id(hex).unwrap(), id);
//! ```

use bson::{Binary, Bson, Document, oid::ObjectId};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identifier field carried by every persisted document.
pub const ID_FIELD: &str = "_id";

/// Converts a caller-supplied identifier into a native [`ObjectId`].
///
/// Accepted inputs:
///
/// - a native object id (returned as is)
/// - a 24-character hex string
/// - a binary value holding either the 12 raw id bytes or the UTF-8 text of a hex id
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidIdentifierFormat`] when a string or byte sequence does
/// not decode into an object id, and [`DocumentStoreError::UnsupportedIdentifierType`] for any
/// other value type.
pub fn normalize_id(id: impl Into<Bson>) -> DocumentStoreResult<ObjectId> {
    match id.into() {
        Bson::ObjectId(oid) => Ok(oid),
        Bson::String(hex) => parse_hex(&hex),
        Bson::Binary(Binary { bytes, .. }) => decode_bytes(&bytes),
        other => Err(DocumentStoreError::UnsupportedIdentifierType(format!(
            "{:?}",
            other.element_type()
        ))),
    }
}

fn parse_hex(hex: &str) -> DocumentStoreResult<ObjectId> {
    ObjectId::parse_str(hex)
        .map_err(|_| DocumentStoreError::InvalidIdentifierFormat(hex.to_string()))
}

fn decode_bytes(bytes: &[u8]) -> DocumentStoreResult<ObjectId> {
    if let Ok(raw) = <[u8; 12]>::try_from(bytes) {
        return Ok(ObjectId::from_bytes(raw));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => parse_hex(text),
        Err(_) => Err(DocumentStoreError::InvalidIdentifierFormat(format!(
            "{} undecodable bytes",
            bytes.len()
        ))),
    }
}

/// Produces a new globally-unique identifier for a document inserted without one.
pub fn generate_id() -> ObjectId {
    ObjectId::new()
}

/// Returns true when an identifier value should be treated as absent.
///
/// A missing field, an explicit `null` and an empty string all count as absent.
pub fn is_missing_id(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) => true,
        Some(Bson::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Returns a copy of `document` whose native identifier is replaced by its hex string.
///
/// Documents without an `_id`, or whose `_id` is not an object id, are copied unchanged.
/// The input document is never modified.
pub fn externalize(document: &Document) -> Document {
    let mut external = document.clone();

    if let Some(Bson::ObjectId(oid)) = document.get(ID_FIELD) {
        external.insert(ID_FIELD, oid.to_hex());
    }

    external
}

/// Returns a copy of `document` without its identifier field.
///
/// Used on update payloads so callers can never rewrite a stored identifier.
pub fn strip_id(document: &Document) -> Document {
    let mut stripped = document.clone();
    stripped.remove(ID_FIELD);
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, spec::BinarySubtype};

    fn binary(bytes: Vec<u8>) -> Bson {
        Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes })
    }

    #[test]
    fn normalize_accepts_native_hex_and_bytes() {
        let id = generate_id();

        assert_eq!(normalize_id(id).unwrap(), id);
        assert_eq!(normalize_id(id.to_hex()).unwrap(), id);
        assert_eq!(normalize_id(binary(id.bytes().to_vec())).unwrap(), id);
        assert_eq!(normalize_id(binary(id.to_hex().into_bytes())).unwrap(), id);
    }

    #[test]
    fn normalize_rejects_malformed_strings() {
        assert!(matches!(
            normalize_id("not-a-hex-string"),
            Err(DocumentStoreError::InvalidIdentifierFormat(_))
        ));
        // right alphabet, wrong length
        assert!(matches!(
            normalize_id("abc123"),
            Err(DocumentStoreError::InvalidIdentifierFormat(_))
        ));
        assert!(matches!(
            normalize_id(""),
            Err(DocumentStoreError::InvalidIdentifierFormat(_))
        ));
    }

    #[test]
    fn normalize_rejects_undecodable_bytes() {
        assert!(matches!(
            normalize_id(binary(vec![0xff, 0xfe, 0x00])),
            Err(DocumentStoreError::InvalidIdentifierFormat(_))
        ));
        assert!(matches!(
            normalize_id(binary(b"zzzzzzzzzzzzzzzzzzzzzzzz".to_vec())),
            Err(DocumentStoreError::InvalidIdentifierFormat(_))
        ));
    }

    #[test]
    fn normalize_rejects_other_types() {
        assert!(matches!(
            normalize_id(42_i32),
            Err(DocumentStoreError::UnsupportedIdentifierType(_))
        ));
        assert!(matches!(
            normalize_id(true),
            Err(DocumentStoreError::UnsupportedIdentifierType(_))
        ));
    }

    #[test]
    fn externalize_round_trips_through_normalize() {
        let id = generate_id();
        let original = doc! { "_id": id, "content": "hello" };

        let external = externalize(&original);

        assert_eq!(external.get_str("_id").unwrap(), id.to_hex());
        assert_eq!(normalize_id(external.get("_id").cloned().unwrap()).unwrap(), id);
        // the source document keeps its native id
        assert_eq!(original.get_object_id("_id").unwrap(), id);
    }

    #[test]
    fn externalize_leaves_documents_without_native_id_alone() {
        let no_id = doc! { "content": "hello" };
        let string_id = doc! { "_id": "custom", "content": "hello" };

        assert_eq!(externalize(&no_id), no_id);
        assert_eq!(externalize(&string_id), string_id);
    }

    #[test]
    fn missing_id_covers_absent_null_and_empty() {
        assert!(is_missing_id(None));
        assert!(is_missing_id(Some(&Bson::Null)));
        assert!(is_missing_id(Some(&Bson::String(String::new()))));
        assert!(!is_missing_id(Some(&Bson::ObjectId(generate_id()))));
        assert!(!is_missing_id(Some(&Bson::String("abc".into()))));
    }

    #[test]
    fn strip_id_copies_before_removing() {
        let update = doc! { "_id": generate_id(), "seen": true };

        let stripped = strip_id(&update);

        assert!(!stripped.contains_key("_id"));
        assert!(update.contains_key("_id"));
        assert_eq!(stripped, doc! { "seen": true });
    }
}
