use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use log::debug;
use mea::rwlock::RwLock;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use std::collections::HashMap;

use docmap_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    id::Id,
    index::{Index, IndexOrder},
    query::{Expr, Query, QueryVisitor, SortDirection},
};

use crate::query::{MONGO_ID, MongoQueryTranslator, stored_field};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_NOT_FOUND: i32 = 27;

fn error_code(error: &MongoError) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        _ => None,
    }
}

fn backend_error(error: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(error.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    /// Declared indexes per collection. MongoDB only knows about built indexes.
    declared: RwLock<HashMap<String, Vec<Index>>>,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            declared: RwLock::new(HashMap::new()),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    /// Moves the id into `_id`.
    fn prepare_document(&self, id: &Id, document: Document) -> Document {
        let mut prepared = doc! { MONGO_ID: id.to_bson() };
        for (key, value) in document {
            if key != ID_FIELD {
                prepared.insert(key, value);
            }
        }
        prepared
    }

    /// Moves `_id` back into the id field.
    fn restore_document(&self, document: Document) -> Document {
        let mut restored = Document::new();
        if let Some(id) = document.get(MONGO_ID) {
            restored.insert(ID_FIELD, id.clone());
        }
        for (key, value) in document {
            if key != MONGO_ID {
                restored.insert(key, value);
            }
        }
        restored
    }

    fn id_filter(id: &Id) -> Document {
        doc! { MONGO_ID: id.to_bson() }
    }

    fn index_from_model(collection: &str, model: &IndexModel) -> Option<Index> {
        let (field, direction) = model.keys.iter().next()?;
        let direction = match direction {
            Bson::Int32(value) => *value as i64,
            Bson::Int64(value) => *value,
            Bson::Double(value) => *value as i64,
            _ => 1,
        };
        let attribute = if field == MONGO_ID { ID_FIELD } else { field.as_str() };

        Some(Index {
            collection: collection.to_string(),
            attribute: attribute.to_string(),
            unique: model
                .options
                .as_ref()
                .and_then(|options| options.unique)
                .unwrap_or(false),
            order: IndexOrder::from_direction(direction),
        })
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Id> {
        let id = match document.get(ID_FIELD) {
            None | Some(Bson::Null) => Id::new(),
            Some(bson) => Id::from_bson(bson).ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!(
                    "id must be a uuid, string or integer, got {:?}",
                    bson.element_type()
                ))
            })?,
        };

        self.get_collection(collection)
            .insert_one(self.prepare_document(&id, document))
            .await
            .map_err(|e| match error_code(&e) {
                Some(DUPLICATE_KEY) => {
                    DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string())
                }
                _ => backend_error(e),
            })?;
        debug!("event=insert module=mongodb collection={collection} id={id}");

        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &Id,
        partial: Document,
    ) -> DocumentStoreResult<()> {
        let changes = Document::from_iter(
            partial
                .into_iter()
                .filter(|(key, _)| key != ID_FIELD && key != MONGO_ID),
        );

        let result = self
            .get_collection(collection)
            .update_one(Self::id_filter(id), doc! { "$set": changes })
            .await
            .map_err(backend_error)?;

        if result.matched_count == 0 {
            return Err(DocumentStoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            ));
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &Id) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_one(Self::id_filter(id))
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete_all(&self, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! {})
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<u64> {
        let filter = match &filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };

        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn first_document(&self, collection: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(self
            .get_collection(collection)
            .find_one(doc! {})
            .await
            .map_err(backend_error)?
            .map(|document| self.restore_document(document)))
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            // The server reads a zero limit as "no limit".
            if limit == 0 {
                return Ok(Vec::new());
            }
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                stored_field(&sort.field): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };

        Ok(self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(|document| self.restore_document(document))
            .collect())
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: Vec<Id>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let ids = ids.iter().map(Id::to_bson).collect::<Vec<_>>();

        Ok(self
            .get_collection(collection)
            .find(doc! { MONGO_ID: { "$in": ids } })
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(|document| self.restore_document(document))
            .collect())
    }

    fn can_serialize(&self, value: &Bson) -> bool {
        !matches!(value, Bson::Undefined | Bson::DbPointer(_) | Bson::Symbol(_))
    }

    async fn increment(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        delta: i64,
    ) -> DocumentStoreResult<()> {
        let result = self
            .get_collection(collection)
            .update_one(Self::id_filter(id), doc! { "$inc": { field: delta } })
            .await
            .map_err(|e| match e.kind.as_ref() {
                ErrorKind::Write(_) => DocumentStoreError::OperationFailed(e.to_string()),
                _ => backend_error(e),
            })?;

        if result.matched_count == 0 {
            return Err(DocumentStoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            ));
        }

        Ok(())
    }

    async fn add_index(&self, index: Index) -> DocumentStoreResult<()> {
        let mut declared = self.declared.write().await;
        let indexes = declared.entry(index.collection.clone()).or_default();

        if !indexes.contains(&index) {
            indexes.push(index);
        }

        Ok(())
    }

    async fn indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        Ok(self
            .declared
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn active_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<Index>> {
        let cursor = match self.get_collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if error_code(&e) == Some(NAMESPACE_NOT_FOUND) => return Ok(vec![]),
            Err(e) => return Err(backend_error(e)),
        };

        Ok(cursor
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(backend_error)?
            .iter()
            .filter_map(|model| Self::index_from_model(collection, model))
            .collect())
    }

    async fn activate_index(&self, index: &Index) -> DocumentStoreResult<()> {
        self.get_collection(&index.collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { stored_field(&index.attribute): index.order.direction() })
                    .options(
                        IndexOptions::builder()
                            .unique(index.unique)
                            .name(index.name())
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(backend_error)?;
        debug!("event=index_activated module=mongodb index={index}");

        Ok(())
    }

    async fn remove_index(&self, index: &Index) -> DocumentStoreResult<()> {
        if let Some(indexes) = self.declared.write().await.get_mut(&index.collection) {
            indexes.retain(|declared| declared != index);
        }

        match self
            .get_collection(&index.collection)
            .drop_index(index.name())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if matches!(error_code(&e), Some(INDEX_NOT_FOUND | NAMESPACE_NOT_FOUND)) => Ok(()),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
