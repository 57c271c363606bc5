//! Document-database seam.
//!
//! The marketplace persists everything in a hosted document database:
//! collections of schemaless documents, subcollections nested under
//! documents, weak references between documents, and atomic multi-document
//! write batches. The engine only ever talks to [`DocumentStore`]; the
//! hosted client and the in-memory stand-in both live behind it.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod memory;

pub use memory::MemoryStore;

/// Slash-joined path of a collection or subcollection, e.g. `jobs` or
/// `jobs/j1/applicants`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment; the name a collection-group query matches on.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified document path: its collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parent document of a subcollection path, when there is one.
    /// `jobs/j1/applicants` + `u1` has the parent `jobs` + `j1`.
    pub fn parent_doc(&self) -> Option<DocPath> {
        let segments: Vec<&str> = self.collection.0.split('/').collect();
        if segments.len() < 3 {
            return None;
        }
        let collection = CollectionPath::new(segments[..segments.len() - 2].join("/"));
        Some(collection.doc(segments[segments.len() - 2]))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document together with the version the store assigned to its
/// latest write. Versions back optimistic preconditions.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: DocPath,
    pub version: u64,
    pub data: Value,
}

/// Persisted instant, stored as epoch milliseconds. The only timestamp
/// representation documents carry; domain types use [`DateTime<Utc>`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(i64);

impl Stamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

impl From<DateTime<Utc>> for Stamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }
}

impl From<Stamp> for DateTime<Utc> {
    fn from(stamp: Stamp) -> Self {
        Utc.timestamp_millis_opt(stamp.0)
            .single()
            .unwrap_or_else(|| Utc.timestamp_nanos(0))
    }
}

/// Persisted weak reference to another document: its path string.
/// Domain types never carry these; they carry typed ids and resolve on
/// demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocRef(String);

impl DocRef {
    pub fn new(collection: &str, id: impl fmt::Display) -> Self {
        Self(format!("{collection}/{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the referenced document (the final path segment).
    pub fn doc_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-field mutation inside a [`Patch`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Replace the field (creating it when absent).
    Set(Value),
    /// Delete the field; a no-op when absent.
    Remove,
    /// Append elements not already present, treating a missing field as an
    /// empty array. Duplicates are compared by deep equality.
    ArrayUnion(Vec<Value>),
    /// Remove all equal elements; a no-op on a missing field.
    ArrayRemove(Vec<Value>),
}

/// Field-level merge applied by [`DocumentStore::update`]. Keys may be
/// dotted paths (`freelancer.jobs`) addressing nested map fields.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    fields: Vec<(String, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), FieldOp::Set(value)));
        self
    }

    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldOp::Remove));
        self
    }

    pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.push((field.into(), FieldOp::ArrayUnion(values)));
        self
    }

    pub fn array_remove(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.push((field.into(), FieldOp::ArrayRemove(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, FieldOp)] {
        &self.fields
    }
}

/// Guard a batched write against concurrent modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The document must exist, at any version.
    MustExist,
    /// The document must exist at exactly this version.
    Version(u64),
}

#[derive(Debug)]
pub enum WriteOp {
    Set { path: DocPath, data: Value },
    Update {
        path: DocPath,
        patch: Patch,
        guard: Precondition,
    },
    Delete { path: DocPath },
}

/// Staged multi-document write, committed atomically: either every
/// operation applies or none does.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the document wholesale.
    pub fn set(&mut self, path: DocPath, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set { path, data });
        self
    }

    /// Merge fields into an existing document; the commit fails with
    /// [`StoreError::NotFound`] when it is absent.
    pub fn update(&mut self, path: DocPath, patch: Patch) -> &mut Self {
        self.ops.push(WriteOp::Update {
            path,
            patch,
            guard: Precondition::MustExist,
        });
        self
    }

    /// Like [`WriteBatch::update`] but additionally requires the observed
    /// version, failing the commit with [`StoreError::Conflict`] when a
    /// concurrent write moved the document on.
    pub fn update_if_version(&mut self, path: DocPath, patch: Patch, version: u64) -> &mut Self {
        self.ops.push(WriteOp::Update {
            path,
            patch,
            guard: Precondition::Version(version),
        });
        self
    }

    /// Delete the document; deleting an absent document is a no-op.
    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(String),
    #[error("document {0} already exists")]
    AlreadyExists(String),
    #[error("write conflict on {0}")]
    Conflict(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// A stored value that does not match the shape the engine expects.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("document {path} does not decode as {shape}: {reason}")]
    Decode {
        path: String,
        shape: &'static str,
        reason: String,
    },
    #[error("{shape} value does not encode: {reason}")]
    Encode {
        shape: &'static str,
        reason: String,
    },
}

/// Serialize a document shape into the store's value representation.
pub fn encode<T: Serialize>(entity: &T) -> Result<Value, ConvertError> {
    serde_json::to_value(entity).map_err(|err| ConvertError::Encode {
        shape: std::any::type_name::<T>(),
        reason: err.to_string(),
    })
}

/// Deserialize a stored document into a document shape, keeping the path
/// in the error for diagnostics.
pub fn decode<T: DeserializeOwned>(doc: &Document) -> Result<T, ConvertError> {
    serde_json::from_value(doc.data.clone()).map_err(|err| ConvertError::Decode {
        path: doc.path.to_string(),
        shape: std::any::type_name::<T>(),
        reason: err.to_string(),
    })
}

/// The document database the engine runs against.
///
/// Implementations provide point reads, id allocation, collection and
/// collection-group listing, and atomic batch commits; single-document
/// writes are provided on top of [`DocumentStore::commit`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Reserve a fresh document id in the collection without writing
    /// anything, so a batch can create the document atomically alongside
    /// other writes.
    async fn allocate_id(&self, collection: &CollectionPath) -> Result<String, StoreError>;

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    /// Every document of every collection whose final path segment equals
    /// `leaf`, regardless of nesting depth.
    async fn list_group(&self, leaf: &str) -> Result<Vec<Document>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Create a document with a store-assigned id.
    async fn create(&self, collection: &CollectionPath, data: Value) -> Result<DocPath, StoreError> {
        let id = self.allocate_id(collection).await?;
        let path = collection.doc(id);
        self.set(&path, data).await?;
        Ok(path)
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), data);
        self.commit(batch).await
    }

    async fn update(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.update(path.clone(), patch);
        self.commit(batch).await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(path.clone());
        self.commit(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_parent_walks_up_one_document() {
        let applicants = CollectionPath::new("jobs/j1/applicants");
        let applicant = applicants.doc("u1");
        let parent = applicant.parent_doc().expect("subdoc has a parent");
        assert_eq!(parent.to_string(), "jobs/j1");
        assert!(parent.parent_doc().is_none());
    }

    #[test]
    fn collection_leaf_is_last_segment() {
        assert_eq!(CollectionPath::new("jobs").leaf(), "jobs");
        assert_eq!(CollectionPath::new("jobs/j1/applicants").leaf(), "applicants");
    }

    #[test]
    fn stamp_round_trips_to_the_millisecond() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).single().expect("valid date");
        let stamp = Stamp::from(at);
        assert_eq!(DateTime::<Utc>::from(stamp), at);
    }

    #[test]
    fn doc_ref_exposes_document_id() {
        let re = DocRef::new("companies", "c42");
        assert_eq!(re.as_str(), "companies/c42");
        assert_eq!(re.doc_id(), "c42");
    }
}
