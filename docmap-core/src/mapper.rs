//! Mappers: serialization and persistence of one mapped class.
//!
//! A [`Mapper<T>`] owns the definition of `T`, talks to the store, and keeps the identity map
//! of `T`. Mappers are created by the [`MapperRegistry`](crate::registry::MapperRegistry) and
//! obtained with [`MapperRegistry::mapper`](crate::registry::MapperRegistry::mapper).
//!
//! # Example
//!
//! ```ignore
//! let books = registry.mapper::<Book>()?;
//!
//! let mut book = Book { title: "Moby Dick".into(), ..Book::default() };
//! let id = books.insert(&mut book).await?;
//!
//! let found = books.find(id).await?;
//! let cheap = books.select(|b| b.attribute("price").lt(10)).to_vec().await?;
//! books.increment(&book, "copies_sold", 1).await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use log::{debug, trace};
use rand::Rng;
use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    attribute::AttributeSet,
    backend::StoreBackend,
    codec::Codec,
    definition::MapperDefinition,
    dereference::Dereferencer,
    document::{ErasedObject, ID_FIELD, METADATA_KEY, Mapped},
    error::{DocumentStoreError, MappingError, MappingResult},
    id::Id,
    identity::IdentityMap,
    index::{Index, IndexOptions},
    options::{MapperOptions, UnknownAttributePolicy},
    query::{Expr, QueryAttributes},
    registry::{AnyMapper, MapperRegistry},
    retrieval::Retrieval,
};

/// The object an operation applies to: a persisted object or its id.
#[derive(Debug)]
pub enum Target<'a, T> {
    Object(&'a T),
    Id(Id),
}

impl<'a, T: Mapped> From<&'a T> for Target<'a, T> {
    fn from(object: &'a T) -> Self {
        Target::Object(object)
    }
}

impl<T> From<Id> for Target<'_, T> {
    fn from(id: Id) -> Self {
        Target::Id(id)
    }
}

/// Maps objects of class `T` to documents and back, and persists them.
pub struct Mapper<T> {
    definition: MapperDefinition<T>,
    backend: Arc<dyn StoreBackend>,
    registry: Weak<MapperRegistry>,
    identity: IdentityMap<T>,
    options: MapperOptions,
}

impl<T: Mapped> Mapper<T> {
    pub(crate) fn new(
        definition: MapperDefinition<T>,
        backend: Arc<dyn StoreBackend>,
        registry: Weak<MapperRegistry>,
        options: MapperOptions,
    ) -> Self {
        Self {
            definition,
            backend,
            registry,
            identity: IdentityMap::new(),
            options,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.definition.class()
    }

    pub fn collection(&self) -> &'static str {
        self.definition.collection()
    }

    pub fn definition(&self) -> &MapperDefinition<T> {
        &self.definition
    }

    /// Mapped attribute names in declaration order.
    pub fn attributes(&self) -> Vec<&str> {
        self.definition.attributes().names().collect()
    }

    pub fn attribute_set(&self) -> &AttributeSet {
        self.definition.attributes()
    }

    pub fn identity_map(&self) -> &IdentityMap<T> {
        &self.identity
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    pub fn registry(&self) -> MappingResult<Arc<MapperRegistry>> {
        self.registry
            .upgrade()
            .ok_or(MappingError::RegistryUnavailable)
    }

    /// Whether the object has been persisted.
    pub fn persisted(&self, object: &T) -> bool {
        object.id().is_some()
    }

    pub fn id_for<'o>(&self, object: &'o T) -> Option<&'o Id> {
        object.id()
    }

    fn target_id(&self, target: Target<'_, T>) -> MappingResult<Id> {
        match target {
            Target::Object(object) => object.id().cloned().ok_or(MappingError::NotPersisted {
                class: self.class_name(),
            }),
            Target::Id(id) => Ok(id),
        }
    }

    /// Serializes an object into a document, attributes in declaration order.
    ///
    /// The id is not part of the document.
    pub fn serialize(&self, object: &T) -> MappingResult<Document> {
        let registry = self.registry()?;
        let codec = Codec::new(&registry, self.class_name());

        let mut document = Document::new();
        for attribute in self.definition.attributes() {
            let Some(accessor) = self.definition.accessor(attribute.name()) else {
                continue;
            };

            let value = accessor.read(object)?;
            if let Some(bson) = codec.encode(attribute.name(), attribute.is_embedded(), value)? {
                document.insert(attribute.name(), bson);
            }
        }

        Ok(document)
    }

    /// Builds an object from a document.
    pub fn deserialize(&self, document: Document) -> MappingResult<T> {
        let mut object = T::default();
        self.inject(&mut object, document)?;
        Ok(object)
    }

    /// Writes the fields of `document` into an existing object.
    ///
    /// Keys may carry a leading `@`. The `id` key sets the object id and the metadata key is
    /// skipped.
    pub fn inject(&self, object: &mut T, document: Document) -> MappingResult<()> {
        let registry = self.registry()?;
        let codec = Codec::new(&registry, self.class_name());

        for (key, bson) in document {
            let name = key.strip_prefix('@').unwrap_or(&key);

            if name == ID_FIELD {
                let id = Id::from_bson(&bson).ok_or_else(|| {
                    MappingError::mismatch("Id", format!("{:?}", bson.element_type()))
                })?;
                object.set_id(id);
                continue;
            }

            if name == METADATA_KEY {
                continue;
            }

            match self.definition.accessor(name) {
                Some(accessor) => accessor.write(object, codec.decode(bson)?)?,
                None => match self.options.unknown_attributes {
                    UnknownAttributePolicy::Ignore => {
                        trace!(
                            "event=field_ignored module=mapper class={} field={name}",
                            self.class_name()
                        );
                    }
                    UnknownAttributePolicy::Reject => {
                        return Err(MappingError::UnknownAttribute {
                            class: self.class_name(),
                            attribute: name.to_string(),
                        });
                    }
                },
            }
        }

        Ok(())
    }

    /// Persists a new object and assigns its id.
    ///
    /// Invalid objects never reach the store. The id comes from the object itself, then from
    /// the id rule, then from the store.
    pub async fn insert(&self, object: &mut T) -> MappingResult<Id> {
        if !self.definition.is_valid(object) {
            debug!(
                "event=insert module=mapper class={} status=invalid",
                self.class_name()
            );
            return Err(MappingError::ValidationFailure {
                class: self.class_name(),
            });
        }

        let mut document = self.serialize(object)?;
        if let Some(id) = object
            .id()
            .cloned()
            .or_else(|| self.definition.derive_id(object))
        {
            document.insert(ID_FIELD, id.to_bson());
        }

        let id = self
            .backend
            .insert_document(self.collection(), document)
            .await?;
        debug!(
            "event=insert module=mapper class={} id={id}",
            self.class_name()
        );

        object.set_id(id.clone());
        Ok(id)
    }

    /// Applies a partial update to a stored document. Keys may carry a leading `@`.
    ///
    /// The cached instance of the target, if any, is dropped from the identity map.
    pub async fn update<'o>(
        &self,
        target: impl Into<Target<'o, T>>,
        changes: Document,
    ) -> MappingResult<()>
    where
        T: 'o,
    {
        let id = self.target_id(target.into())?;
        let changes = changes
            .into_iter()
            .map(|(key, value)| match key.strip_prefix('@') {
                Some(name) => (name.to_string(), value),
                None => (key, value),
            })
            .collect();
        self.backend
            .update_document(self.collection(), &id, changes)
            .await?;
        self.identity.invalidate(&id).await;
        debug!(
            "event=update module=mapper class={} id={id}",
            self.class_name()
        );

        Ok(())
    }

    /// Applies a partial update and, optionally, the same changes to the object in memory.
    pub async fn update_object(
        &self,
        object: &mut T,
        changes: Document,
        update_in_memory: bool,
    ) -> MappingResult<()> {
        let id = self.target_id(Target::Object(object))?;
        self.update(id, changes.clone()).await?;

        if update_in_memory {
            self.inject(object, changes)?;
        }

        Ok(())
    }

    /// Writes the whole serialized object over its stored document.
    pub async fn save(&self, object: &T) -> MappingResult<()> {
        let document = self.serialize(object)?;
        self.update(object, document).await
    }

    pub async fn delete<'o>(&self, target: impl Into<Target<'o, T>>) -> MappingResult<()>
    where
        T: 'o,
    {
        let id = self.target_id(target.into())?;
        self.backend
            .delete_document(self.collection(), &id)
            .await?;
        self.identity.invalidate(&id).await;
        debug!(
            "event=delete module=mapper class={} id={id}",
            self.class_name()
        );

        Ok(())
    }

    pub async fn delete_all(&self) -> MappingResult<()> {
        self.backend.delete_all(self.collection()).await?;
        self.identity.clear().await;
        debug!(
            "event=delete_all module=mapper class={}",
            self.class_name()
        );

        Ok(())
    }

    pub async fn count(&self) -> MappingResult<u64> {
        Ok(self
            .backend
            .count_documents(self.collection(), None)
            .await?)
    }

    pub async fn count_where<P>(&self, predicate: P) -> MappingResult<u64>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Ok(self
            .backend
            .count_documents(self.collection(), Some(predicate(&QueryAttributes)))
            .await?)
    }

    /// Whether at least one stored object matches.
    pub async fn any_where<P>(&self, predicate: P) -> MappingResult<bool>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Ok(self.count_where(predicate).await? > 0)
    }

    /// Whether every stored object matches.
    pub async fn all_where<P>(&self, predicate: P) -> MappingResult<bool>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Ok(self.count_where(predicate).await? == self.count().await?)
    }

    /// Whether exactly one stored object matches.
    pub async fn one_where<P>(&self, predicate: P) -> MappingResult<bool>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Ok(self.count_where(predicate).await? == 1)
    }

    /// Whether no stored object matches.
    pub async fn none_where<P>(&self, predicate: P) -> MappingResult<bool>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Ok(self.count_where(predicate).await? == 0)
    }

    /// The first object in store order.
    pub async fn first(&self) -> MappingResult<Option<T>> {
        self.backend
            .first_document(self.collection())
            .await?
            .map(|document| self.deserialize(document))
            .transpose()
    }

    /// A stored object picked at random, or `None` for an empty collection.
    pub async fn sample(&self) -> MappingResult<Option<T>> {
        let count = self.count().await?;
        if count == 0 {
            return Ok(None);
        }

        let offset = rand::rng().random_range(0..count) as usize;
        self.all().offset(offset).first().await
    }

    /// Every stored object.
    pub fn all(&self) -> Retrieval<'_, T> {
        Retrieval::new(self, None)
    }

    /// Stored objects matching the predicate.
    pub fn select<P>(&self, predicate: P) -> Retrieval<'_, T>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Retrieval::new(self, Some(predicate(&QueryAttributes)))
    }

    /// Stored objects not matching the predicate as a whole.
    pub fn reject<P>(&self, predicate: P) -> Retrieval<'_, T>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        Retrieval::new(self, Some(Expr::Not(Box::new(predicate(&QueryAttributes)))))
    }

    /// The first stored object matching the predicate.
    pub async fn find_by<P>(&self, predicate: P) -> MappingResult<Option<T>>
    where
        P: FnOnce(&QueryAttributes) -> Expr,
    {
        self.select(predicate).first().await
    }

    /// Finds an object by id, through the identity map.
    ///
    /// Repeated calls return the same instance for as long as some caller holds it.
    pub async fn find(&self, id: impl Into<Id>) -> MappingResult<Option<Arc<T>>> {
        let id = id.into();
        if let Some(object) = self.identity.get(self.class_name(), &id).await {
            trace!(
                "event=find module=mapper class={} id={id} source=identity_map",
                self.class_name()
            );
            return Ok(Some(object));
        }

        match self.find_uncached(id).await? {
            Some(object) => Ok(Some(self.identity.put(Arc::new(object)).await?)),
            None => Ok(None),
        }
    }

    /// Finds an object by id, bypassing the identity map.
    pub async fn find_uncached(&self, id: impl Into<Id>) -> MappingResult<Option<T>> {
        let id = id.into();
        self.find_by(|attributes| attributes.id().eq(id)).await
    }

    /// Atomically adds `by` to a numeric attribute in the store.
    ///
    /// Non-numeric stored values fail with [`MappingError::NonNumericIncrement`] and are left
    /// unchanged. The cached instance of the target, if any, is dropped from the identity map.
    pub async fn increment<'o>(
        &self,
        target: impl Into<Target<'o, T>>,
        attribute: &str,
        by: i64,
    ) -> MappingResult<()>
    where
        T: 'o,
    {
        let id = self.target_id(target.into())?;
        self.backend
            .increment(self.collection(), &id, attribute, by)
            .await
            .map_err(|error| match error {
                DocumentStoreError::OperationFailed(_) => MappingError::NonNumericIncrement {
                    class: self.class_name(),
                    attribute: attribute.to_string(),
                },
                other => MappingError::Store(other),
            })?;
        self.identity.invalidate(&id).await;

        Ok(())
    }

    /// Atomically subtracts `by` from a numeric attribute in the store.
    pub async fn decrement<'o>(
        &self,
        target: impl Into<Target<'o, T>>,
        attribute: &str,
        by: i64,
    ) -> MappingResult<()>
    where
        T: 'o,
    {
        self.increment(target, attribute, -by).await
    }

    /// Loads the referenced objects of `attribute` for every object in one batch per class
    /// and injects them in place of the references.
    pub async fn load_association(&self, objects: &mut [T], attribute: &str) -> MappingResult<()> {
        let accessor =
            self.definition
                .accessor(attribute)
                .ok_or_else(|| MappingError::UnknownAttribute {
                    class: self.class_name(),
                    attribute: attribute.to_string(),
                })?;

        let values = objects
            .iter()
            .map(|object| accessor.read(object))
            .collect::<MappingResult<Vec<_>>>()?;

        let mut dereferencer = Dereferencer::new(self.registry()?);
        dereferencer.load(&values).await?;

        for (object, value) in objects.iter_mut().zip(values) {
            accessor.write(object, dereferencer.resolve(value))?;
        }

        Ok(())
    }

    /// Declares an index on `attribute`.
    pub async fn index(&self, attribute: &str, options: IndexOptions) -> MappingResult<Index> {
        if !self.definition.attributes().contains(attribute) {
            return Err(MappingError::UnknownAttribute {
                class: self.class_name(),
                attribute: attribute.to_string(),
            });
        }

        let index = Index::new(self.collection(), attribute, options);
        self.backend.add_index(index.clone()).await?;
        debug!(
            "event=index_declared module=mapper class={} index={}",
            self.class_name(),
            index.name()
        );

        Ok(index)
    }

    /// Declared indexes.
    pub async fn indexes(&self) -> MappingResult<Vec<Index>> {
        Ok(self.backend.indexes(self.collection()).await?)
    }

    /// Indexes the store has built.
    pub async fn active_indexes(&self) -> MappingResult<Vec<Index>> {
        Ok(self.backend.active_indexes(self.collection()).await?)
    }

    pub async fn remove_index(&self, index: &Index) -> MappingResult<()> {
        Ok(self.backend.remove_index(index).await?)
    }

    /// Builds every declared index and drops active ones that are no longer declared.
    ///
    /// The store's own id index is never dropped.
    pub async fn reindex(&self) -> MappingResult<()> {
        let declared = self.indexes().await?;
        for index in &declared {
            self.backend.activate_index(index).await?;
        }

        for index in self.active_indexes().await? {
            if index.attribute != ID_FIELD && !declared.contains(&index) {
                self.backend.remove_index(&index).await?;
            }
        }

        debug!(
            "event=reindex module=mapper class={} declared={}",
            self.class_name(),
            declared.len()
        );
        Ok(())
    }

    /// Drops the cached instance for `id`.
    pub async fn invalidate(&self, id: &Id) {
        self.identity.invalidate(id).await;
    }

    pub async fn clear_identity_map(&self) {
        self.identity.clear().await;
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("definition", &self.definition)
            .field("backend", &self.backend)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Mapped> AnyMapper for Mapper<T> {
    fn class_name(&self) -> &'static str {
        self.definition.class()
    }

    fn collection(&self) -> &'static str {
        self.definition.collection()
    }

    fn attribute_set(&self) -> &AttributeSet {
        self.definition.attributes()
    }

    fn serialize_object(&self, object: &dyn ErasedObject) -> MappingResult<Document> {
        let object = object
            .downcast_ref::<T>()
            .ok_or_else(|| MappingError::mismatch(T::class_name(), object.object_class()))?;
        self.serialize(object)
    }

    fn deserialize_object(&self, document: Document) -> MappingResult<Arc<dyn ErasedObject>> {
        Ok(Arc::new(self.deserialize(document)?))
    }

    async fn load_many(&self, ids: Vec<Id>) -> MappingResult<Vec<Arc<dyn ErasedObject>>> {
        let mut loaded: Vec<Arc<dyn ErasedObject>> = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.identity.get(T::class_name(), &id).await {
                Some(object) => loaded.push(object),
                None => missing.push(id),
            }
        }

        if !missing.is_empty() {
            debug!(
                "event=load_many module=mapper class={} fetch={}",
                T::class_name(),
                missing.len()
            );
            let documents = self
                .backend
                .get_documents(self.definition.collection(), missing)
                .await?;
            for document in documents {
                let object = self.identity.put(Arc::new(self.deserialize(document)?)).await?;
                loaded.push(object);
            }
        }

        Ok(loaded)
    }

    async fn declare_indexes(&self) -> MappingResult<()> {
        for attribute in self.definition.attributes() {
            if attribute.is_indexed() {
                self.index(attribute.name(), IndexOptions::default()).await?;
            }
        }

        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
