//! Storage backend abstraction for mappers.
//!
//! This module defines the interface the mapping layer calls on a document store. The mapper
//! only ever speaks documents ([`bson::Document`]) and ids; stores decide how to persist them.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for inserting, updating,
//! deleting, counting and querying documents, plus atomic increments and index bookkeeping.
//! Implementations are required to be thread-safe (`Send + Sync`) and object safe: mappers
//! hold them as `Arc<dyn StoreBackend>`.
//!
//! Documents handed to the store may carry the object id under [`ID_FIELD`]; documents
//! returned by the store always carry it there.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmap::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert_document("users", doc! { "name": "Alice", "age": 30 }).await?;
//! backend.increment("users", &id, "age", 1).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`ID_FIELD`]: crate::document::ID_FIELD

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::DocumentStoreResult,
    id::Id,
    index::Index,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The exact concurrency model is implementation-specific.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Timeouts, retries and cancellation are the store's business; the mapper surfaces whatever
/// error the store reports.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document and returns its id.
    ///
    /// The id is taken from the document's `id` field when present; otherwise the store
    /// generates one. Inserting an id that already exists fails with
    /// [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists).
    async fn insert_document(&self, collection: &str, document: Document)
    -> DocumentStoreResult<Id>;

    /// Merges `partial` into the stored document (`$set` semantics).
    ///
    /// Fails with [`DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// when no document has the id.
    async fn update_document(
        &self,
        collection: &str,
        id: &Id,
        partial: Document,
    ) -> DocumentStoreResult<()>;

    /// Deletes a document. Missing documents are silently skipped.
    async fn delete_document(&self, collection: &str, id: &Id) -> DocumentStoreResult<()>;

    /// Deletes every document of a collection.
    async fn delete_all(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Counts the documents matching `filter`, or all documents when `filter` is `None`.
    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<u64>;

    /// Returns the first document of a collection in store order.
    async fn first_document(&self, collection: &str) -> DocumentStoreResult<Option<Document>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// An empty [`Query`] returns every document.
    async fn query_documents(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Retrieves documents by id in one round trip. Unknown ids are omitted.
    async fn get_documents(
        &self,
        collection: &str,
        ids: Vec<Id>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Whether the store can hold `value` natively.
    fn can_serialize(&self, value: &Bson) -> bool;

    /// Atomically adds `delta` to a numeric field.
    ///
    /// A missing field is created with the value `delta`. A non-numeric field fails with
    /// [`OperationFailed`](crate::error::DocumentStoreError::OperationFailed) and is left
    /// unchanged.
    async fn increment(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        delta: i64,
    ) -> DocumentStoreResult<()>;

    /// Declares an index without building it.
    async fn add_index(&self, index: Index) -> DocumentStoreResult<()>;

    /// Indexes declared for a collection.
    async fn indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>>;

    /// Indexes the store has actually built for a collection.
    async fn active_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>>;

    /// Builds a declared index.
    async fn activate_index(&self, index: &Index) -> DocumentStoreResult<()>;

    /// Drops an index and its declaration.
    async fn remove_index(&self, index: &Index) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with persistent storage or
    /// external connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Id> {
        (**self).insert_document(collection, document).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &Id,
        partial: Document,
    ) -> DocumentStoreResult<()> {
        (**self).update_document(collection, id, partial).await
    }

    async fn delete_document(&self, collection: &str, id: &Id) -> DocumentStoreResult<()> {
        (**self).delete_document(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> DocumentStoreResult<()> {
        (**self).delete_all(collection).await
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<u64> {
        (**self).count_documents(collection, filter).await
    }

    async fn first_document(&self, collection: &str) -> DocumentStoreResult<Option<Document>> {
        (**self).first_document(collection).await
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self).query_documents(collection, query).await
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: Vec<Id>,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self).get_documents(collection, ids).await
    }

    fn can_serialize(&self, value: &Bson) -> bool {
        (**self).can_serialize(value)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        delta: i64,
    ) -> DocumentStoreResult<()> {
        (**self).increment(collection, id, field, delta).await
    }

    async fn add_index(&self, index: Index) -> DocumentStoreResult<()> {
        (**self).add_index(index).await
    }

    async fn indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        (**self).indexes(collection).await
    }

    async fn active_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        (**self).active_indexes(collection).await
    }

    async fn activate_index(&self, index: &Index) -> DocumentStoreResult<()> {
        (**self).activate_index(index).await
    }

    async fn remove_index(&self, index: &Index) -> DocumentStoreResult<()> {
        (**self).remove_index(index).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
