//! In-memory storage implementation for mappers.
//!
//! This module provides a simple in-memory backend that keeps documents in insertion order,
//! guarded by async-aware read-write locks.

use async_trait::async_trait;
use bson::{Bson, Document};
use indexmap::IndexMap;
use log::debug;
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use docmap_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    id::Id,
    index::Index,
    query::{Expr, Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

type CollectionMap = IndexMap<Id, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Declared and built indexes of one collection.
#[derive(Debug, Default, Clone)]
struct IndexState {
    declared: Vec<Index>,
    active: Vec<Index>,
}

/// Thread-safe in-memory document storage backend.
///
/// Documents are kept per collection in insertion order, keyed by id. Every stored document
/// carries its id under the `id` field.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection. Indexes are bookkept so mappers can declare,
/// activate and remove them, but they do not speed up queries.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::InMemoryStore;
/// use docmap::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_document("users", doc! { "name": "Alice", "age": 30 }).await?;
///     let docs = store.get_documents("users", vec![id]).await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    /// Index bookkeeping: collection_name -> indexes
    indexes: Arc<RwLock<HashMap<String, IndexState>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            indexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmap_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn document_id(document: &Document) -> DocumentStoreResult<Option<Id>> {
    match document.get(ID_FIELD) {
        None | Some(Bson::Null) => Ok(None),
        Some(bson) => Id::from_bson(bson).map(Some).ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!(
                "id must be a uuid, string or integer, got {:?}",
                bson.element_type()
            ))
        }),
    }
}

fn not_found(id: &Id, collection: &str) -> DocumentStoreError {
    DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Id> {
        let id = document_id(&document)?.unwrap_or_else(Id::new);

        let mut stored = Document::new();
        stored.insert(ID_FIELD, id.to_bson());
        for (key, value) in document {
            if key != ID_FIELD {
                stored.insert(key, value);
            }
        }

        let mut store = self.store.write().await;
        let collection_map = store.entry(collection.to_string()).or_default();

        if collection_map.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                id.to_string(),
                collection.to_string(),
            ));
        }

        collection_map.insert(id.clone(), stored);
        debug!("event=insert module=memory collection={collection} id={id}");

        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &Id,
        partial: Document,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let document = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(id))
            .ok_or_else(|| not_found(id, collection))?;

        for (key, value) in partial {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &Id) -> DocumentStoreResult<()> {
        if let Some(collection_map) = self.store.write().await.get_mut(collection) {
            collection_map.shift_remove(id);
        }

        Ok(())
    }

    async fn delete_all(&self, collection: &str) -> DocumentStoreResult<()> {
        if let Some(collection_map) = self.store.write().await.get_mut(collection) {
            collection_map.clear();
        }

        Ok(())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(0);
        };

        let count = match &filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter)?.len(),
            None => collection_map.len(),
        };

        Ok(count as u64)
    }

    async fn first_document(&self, collection: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .and_then(|collection_map| collection_map.first())
            .map(|(_, document)| document.clone()))
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        // Apply filter expressions if present
        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter)?,
            None => collection_map.values().collect(),
        };

        // Apply sorting if specified
        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| {
                let left = a
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = b
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        // Apply offset and limit
        Ok(documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: Vec<Id>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection_map.get(id))
            .cloned()
            .collect())
    }

    fn can_serialize(&self, value: &Bson) -> bool {
        !matches!(
            value,
            Bson::JavaScriptCode(_)
                | Bson::JavaScriptCodeWithScope(_)
                | Bson::DbPointer(_)
                | Bson::Symbol(_)
                | Bson::Undefined
                | Bson::MaxKey
                | Bson::MinKey
        )
    }

    async fn increment(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        delta: i64,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let document = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(id))
            .ok_or_else(|| not_found(id, collection))?;

        let incremented = match document.get(field) {
            None => Bson::Int64(delta),
            Some(Bson::Int32(value)) => Bson::Int64(*value as i64 + delta),
            Some(Bson::Int64(value)) => Bson::Int64(value + delta),
            Some(Bson::Double(value)) => Bson::Double(value + delta as f64),
            Some(other) => {
                return Err(DocumentStoreError::OperationFailed(format!(
                    "cannot increment field {field} of type {:?}",
                    other.element_type()
                )));
            }
        };

        document.insert(field, incremented);
        Ok(())
    }

    async fn add_index(&self, index: Index) -> DocumentStoreResult<()> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.entry(index.collection.clone()).or_default();

        if !state.declared.contains(&index) {
            state.declared.push(index);
        }

        Ok(())
    }

    async fn indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        Ok(self
            .indexes
            .read()
            .await
            .get(collection)
            .map(|state| state.declared.clone())
            .unwrap_or_default())
    }

    async fn active_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        Ok(self
            .indexes
            .read()
            .await
            .get(collection)
            .map(|state| state.active.clone())
            .unwrap_or_default())
    }

    async fn activate_index(&self, index: &Index) -> DocumentStoreResult<()> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.entry(index.collection.clone()).or_default();

        if !state.active.contains(index) {
            state.active.push(index.clone());
        }

        Ok(())
    }

    async fn remove_index(&self, index: &Index) -> DocumentStoreResult<()> {
        if let Some(state) = self.indexes.write().await.get_mut(&index.collection) {
            state.declared.retain(|declared| declared != index);
            state.active.retain(|active| active != index);
        }

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::InMemoryStore;
/// use docmap::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docmap_core::{index::IndexOptions, query::Filter};

    use super::*;

    #[tokio::test]
    async fn inserted_documents_carry_their_id() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("books", doc! { "title": "Dune" })
            .await
            .unwrap();

        let documents = store.get_documents("books", vec![id.clone()]).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(Id::from_bson(documents[0].get(ID_FIELD).unwrap()), Some(id));
    }

    #[tokio::test]
    async fn supplied_ids_are_kept_and_unique() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("books", doc! { "id": "dune", "title": "Dune" })
            .await
            .unwrap();
        assert_eq!(id, Id::from("dune"));

        let duplicate = store
            .insert_document("books", doc! { "id": "dune", "title": "Dune" })
            .await;
        assert!(matches!(duplicate, Err(DocumentStoreError::DocumentAlreadyExists(..))));
    }

    #[tokio::test]
    async fn updates_merge_fields() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("books", doc! { "title": "Dune", "pages": 412 })
            .await
            .unwrap();

        store
            .update_document("books", &id, doc! { "pages": 896 })
            .await
            .unwrap();

        let document = store.first_document("books").await.unwrap().unwrap();
        assert_eq!(document.get_str("title").unwrap(), "Dune");
        assert_eq!(document.get_i32("pages").unwrap(), 896);

        let missing = store
            .update_document("books", &Id::from("nope"), doc! {})
            .await;
        assert!(matches!(missing, Err(DocumentStoreError::DocumentNotFound(..))));
    }

    #[tokio::test]
    async fn queries_filter_sort_and_paginate() {
        let store = InMemoryStore::new();
        for (title, price) in [("C", 30), ("A", 10), ("B", 20), ("D", 40)] {
            store
                .insert_document("books", doc! { "title": title, "price": price })
                .await
                .unwrap();
        }

        let query = Query::builder()
            .filter(Filter::gt("price", 10))
            .sort("price", SortDirection::Desc)
            .offset(1)
            .limit(2)
            .build();
        let titles = store
            .query_documents("books", query)
            .await
            .unwrap()
            .iter()
            .map(|document| document.get_str("title").unwrap().to_string())
            .collect::<Vec<_>>();

        assert_eq!(titles, ["C", "B"]);
        assert_eq!(
            store
                .count_documents("books", Some(Filter::lt("price", 25)))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn increments_leave_non_numeric_fields_alone() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("books", doc! { "title": "Dune", "sold": 1 })
            .await
            .unwrap();

        store.increment("books", &id, "sold", 2).await.unwrap();
        store.increment("books", &id, "reprints", 1).await.unwrap();
        let failed = store.increment("books", &id, "title", 1).await;

        let document = store.first_document("books").await.unwrap().unwrap();
        assert_eq!(document.get_i64("sold").unwrap(), 3);
        assert_eq!(document.get_i64("reprints").unwrap(), 1);
        assert_eq!(document.get_str("title").unwrap(), "Dune");
        assert!(matches!(failed, Err(DocumentStoreError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn indexes_are_declared_before_they_are_active() {
        let store = InMemoryStore::new();
        let index = Index::new("books", "title", IndexOptions::unique());

        store.add_index(index.clone()).await.unwrap();
        assert_eq!(store.indexes("books").await.unwrap(), vec![index.clone()]);
        assert!(store.active_indexes("books").await.unwrap().is_empty());

        store.activate_index(&index).await.unwrap();
        assert_eq!(store.active_indexes("books").await.unwrap(), vec![index.clone()]);

        store.remove_index(&index).await.unwrap();
        assert!(store.indexes("books").await.unwrap().is_empty());
        assert!(store.active_indexes("books").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletes_are_idempotent() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("books", doc! { "title": "Dune" })
            .await
            .unwrap();

        store.delete_document("books", &id).await.unwrap();
        store.delete_document("books", &id).await.unwrap();
        store.delete_document("missing", &id).await.unwrap();
        assert_eq!(store.count_documents("books", None).await.unwrap(), 0);
    }
}
