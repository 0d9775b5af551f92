//! Document-store contract used by the profile repositories.
//!
//! # Responsibility
//! - Name the fixed collections of the storage contract.
//! - Define the primitive operations the consistency protocol relies on.
//! - Classify driver failures into store-level errors.
//!
//! # Invariants
//! - Each primitive is atomic on its own; none spans collections.
//! - `add_to_set`/`pull`/`pull_all` are atomic set updates, so concurrent
//!   membership changes on one document never lose a write.
//! - Documents are JSON objects carrying their primary key under `_id`.

use crate::db::DbError;
use crate::model::ids::ObjectId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

mod sqlite;

pub use sqlite::SqliteDocumentStore;

/// JSON document as exchanged with a store.
pub type Document = serde_json::Value;

pub type StoreResult<T> = Result<T, StoreError>;

/// Collections of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Customers,
    Cards,
    Addresses,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Customers, Self::Cards, Self::Addresses];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Cards => "cards",
            Self::Addresses => "addresses",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection name that is not part of the storage contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollection(pub String);

impl Display for UnknownCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown collection `{}`", self.0)
    }
}

impl Error for UnknownCollection {}

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

/// Store-level failure, independent of which operation was running.
#[derive(Debug)]
pub enum StoreError {
    /// Driver or bootstrap failure.
    Db(DbError),
    /// Write rejected by a uniqueness constraint.
    Conflict(String),
    /// No session could be acquired within the configured timeout.
    Unavailable(String),
    /// Persisted document does not match the expected shape.
    MalformedDocument(String),
    Serialization(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "write conflict: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::MalformedDocument(message) => write!(f, "malformed document: {message}"),
            Self::Serialization(err) => write!(f, "document encoding failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Conflict(_) | Self::Unavailable(_) | Self::MalformedDocument(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(message.clone().unwrap_or_else(|| code.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Primitive operations over the fixed collections.
///
/// Implementations acquire and release their own session per call.
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document. Its `_id` must not exist yet.
    fn insert(&self, collection: Collection, document: &Document) -> StoreResult<()>;

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>>;

    /// Returns the documents whose `_id` is in `ids`, in store order.
    /// Missing ids are skipped.
    fn find_by_ids(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<Vec<Document>>;

    /// Returns the first document whose top-level string `field` equals `value`.
    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>>;

    /// Returns at most `limit` documents in store order.
    fn find_all(&self, collection: Collection, limit: u32) -> StoreResult<Vec<Document>>;

    /// Adds `value` to the array `field` of document `id` unless present.
    /// Returns `false` when no document matched `id`.
    fn add_to_set(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool>;

    /// Removes `value` from the array `field` of document `id`.
    /// Returns `false` when no document matched `id`.
    fn pull(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool>;

    /// Removes `value` from the array `field` of every document in the
    /// collection. Returns the number of documents modified.
    fn pull_all(&self, collection: Collection, field: &str, value: ObjectId) -> StoreResult<u64>;

    /// Deletes the documents whose `_id` is in `ids`. Absent ids are ignored.
    /// Returns the number of documents removed.
    fn delete_many(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<u64>;

    fn ping(&self) -> StoreResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn insert(&self, collection: Collection, document: &Document) -> StoreResult<()> {
        (**self).insert(collection, document)
    }

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>> {
        (**self).find_by_id(collection, id)
    }

    fn find_by_ids(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<Vec<Document>> {
        (**self).find_by_ids(collection, ids)
    }

    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        (**self).find_by_field(collection, field, value)
    }

    fn find_all(&self, collection: Collection, limit: u32) -> StoreResult<Vec<Document>> {
        (**self).find_all(collection, limit)
    }

    fn add_to_set(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        (**self).add_to_set(collection, id, field, value)
    }

    fn pull(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        (**self).pull(collection, id, field, value)
    }

    fn pull_all(&self, collection: Collection, field: &str, value: ObjectId) -> StoreResult<u64> {
        (**self).pull_all(collection, field, value)
    }

    fn delete_many(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<u64> {
        (**self).delete_many(collection, ids)
    }

    fn ping(&self) -> StoreResult<()> {
        (**self).ping()
    }
}

/// Serializes a stored shape into a document.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Document> {
    let document = serde_json::to_value(value)?;
    if !document.is_object() {
        return Err(StoreError::MalformedDocument(
            "top-level document must be an object".to_string(),
        ));
    }
    Ok(document)
}

/// Deserializes a document read from `collection`.
pub fn decode<T: DeserializeOwned>(collection: Collection, document: Document) -> StoreResult<T> {
    serde_json::from_value(document)
        .map_err(|err| StoreError::MalformedDocument(format!("{collection}: {err}")))
}

/// Reads the `_id` of a document.
pub fn document_id(document: &Document) -> StoreResult<ObjectId> {
    let raw = document
        .get("_id")
        .and_then(Document::as_str)
        .ok_or_else(|| StoreError::MalformedDocument("document has no string `_id`".to_string()))?;
    ObjectId::parse(raw).map_err(|err| StoreError::MalformedDocument(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{document_id, encode, Collection, StoreError};
    use crate::model::ids::ObjectId;
    use serde_json::json;

    #[test]
    fn collection_names_parse_back() {
        for collection in Collection::ALL {
            assert_eq!(collection.as_str().parse::<Collection>().unwrap(), collection);
        }
        let err = "orders".parse::<Collection>().unwrap_err();
        assert_eq!(err.0, "orders");
    }

    #[test]
    fn encode_rejects_non_object_documents() {
        assert!(matches!(
            encode(&vec![1, 2, 3]),
            Err(StoreError::MalformedDocument(_))
        ));
    }

    #[test]
    fn document_id_requires_valid_hex() {
        let id = ObjectId::new();
        assert_eq!(document_id(&json!({ "_id": id.to_hex() })).unwrap(), id);
        assert!(document_id(&json!({ "_id": "nope" })).is_err());
        assert!(document_id(&json!({ "name": "x" })).is_err());
    }
}
