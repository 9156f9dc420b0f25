//! Error types and result types for mapping and document store operations.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentStoreError`] is raised by storage backends and describes what went wrong in
//!   the store itself.
//! - [`MappingError`] is raised by the mapping layer. Store errors pass through it unchanged
//!   via [`MappingError::Store`], except where the mapper translates them (see
//!   [`MappingError::NonNumericIncrement`]).
//!
//! Use [`MappingResult<T>`] as the return type for fallible mapping operations and
//! [`DocumentStoreResult<T>`] inside backends.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between BSON and Rust values.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document violates structural constraints of the store.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The query cannot be evaluated, for example because of a malformed pattern.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The store refused to apply an operation to the stored value, for example an
    /// increment of a string field.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// Errors raised by the mapping layer.
///
/// Mapping errors are raised synchronously at the call site and are never retried
/// internally; callers own the retry policy.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The validator rejected the object, so it was never sent to the store.
    #[error("{class} object is invalid and cannot be persisted")]
    ValidationFailure { class: &'static str },
    /// A referenced (non-embedded) association has no id at serialization time.
    #[error("attribute `{attribute}` references an unpersisted {class} object")]
    DanglingReference { class: String, attribute: String },
    /// The same attribute name was declared twice on one mapped class.
    #[error("attribute `{attribute}` is already defined on {class}")]
    DuplicateAttribute { class: &'static str, attribute: String },
    /// The attribute name cannot be stored (empty, reserved, or containing `.`/`$`).
    #[error("attribute name `{attribute}` is not allowed on {class}")]
    InvalidAttribute { class: &'static str, attribute: String },
    /// A document field has no matching attribute and the mapper runs in strict mode.
    #[error("document field `{attribute}` does not match any attribute of {class}")]
    UnknownAttribute { class: &'static str, attribute: String },
    /// An increment or decrement targeted a non-numeric stored value.
    #[error("attempted to increment non-numeric attribute `{attribute}` of {class}")]
    NonNumericIncrement { class: &'static str, attribute: String },
    /// No mapper is registered for the class.
    #[error("no mapper registered for class {0}")]
    NotRegistered(String),
    /// The operation needs an id but the object was never persisted.
    #[error("{class} object has no id; it must be persisted first")]
    NotPersisted { class: &'static str },
    /// A value could not be converted into the declared field type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// A value with no native representation and no mapper was rejected by policy.
    #[error("attribute `{attribute}` of {class} cannot be serialized")]
    Unserializable { class: &'static str, attribute: String },
    /// The registry owning the mapper has been dropped.
    #[error("the mapper registry is no longer available")]
    RegistryUnavailable,
    /// An error reported by the storage backend.
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
}

/// A specialized `Result` type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

impl From<BsonError> for MappingError {
    fn from(err: BsonError) -> Self {
        MappingError::Store(DocumentStoreError::from(err))
    }
}

impl MappingError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        MappingError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
