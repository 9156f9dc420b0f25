//! The mapper registry.
//!
//! The registry ties every mapped class to its [`Mapper`]. It is populated once, during
//! startup, through a [`RegistryBuilder`] and is immutable afterwards: lookups take no lock.
//! Mappers keep a weak handle back to the registry so they can find the mappers of associated
//! classes while serializing and loading associations.
//!
//! # Example
//!
//! ```ignore
//! use docmap::{MapperRegistry, memory::InMemoryStore};
//!
//! let store = InMemoryStore::builder().build().await?;
//!
//! let mut builder = MapperRegistry::builder(store);
//! builder
//!     .register::<User>()?
//!     .register_with::<Book, _>(|definition| {
//!         Ok(definition.id(|book: &Book| Some(Id::from(slugify(&book.title)))))
//!     })?;
//! let registry = builder.build();
//!
//! let books = registry.mapper::<Book>()?;
//! ```

use async_trait::async_trait;
use bson::Document;
use indexmap::IndexMap;
use log::{debug, info};
use std::{
    any::Any,
    fmt::Debug,
    sync::{Arc, Weak},
};

use crate::{
    attribute::AttributeSet,
    backend::StoreBackend,
    definition::DefinitionBuilder,
    document::{ErasedObject, Mapped},
    error::{MappingError, MappingResult},
    id::Id,
    mapper::Mapper,
    options::MapperOptions,
};

/// Class-independent view of a [`Mapper`].
///
/// The codec and the dereferencer only know class names at runtime; this trait is what they
/// talk to.
#[async_trait]
pub trait AnyMapper: Send + Sync + Debug {
    fn class_name(&self) -> &'static str;

    fn collection(&self) -> &'static str;

    fn attribute_set(&self) -> &AttributeSet;

    /// Serializes an object of this mapper's class.
    fn serialize_object(&self, object: &dyn ErasedObject) -> MappingResult<Document>;

    /// Rebuilds an object of this mapper's class.
    fn deserialize_object(&self, document: Document) -> MappingResult<Arc<dyn ErasedObject>>;

    /// Loads objects by id: identity-map hits first, the rest in one store fetch.
    async fn load_many(&self, ids: Vec<Id>) -> MappingResult<Vec<Arc<dyn ErasedObject>>>;

    /// Declares a store index for every attribute flagged `indexed`.
    async fn declare_indexes(&self) -> MappingResult<()>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

type MapperFactory = Box<
    dyn FnOnce(Weak<MapperRegistry>, Arc<dyn StoreBackend>, MapperOptions) -> Arc<dyn AnyMapper>
        + Send,
>;

/// Startup-phase builder of a [`MapperRegistry`].
pub struct RegistryBuilder {
    backend: Arc<dyn StoreBackend>,
    options: MapperOptions,
    factories: IndexMap<&'static str, MapperFactory>,
}

impl RegistryBuilder {
    /// Registers `T` with the definition from [`Mapped::define`].
    pub fn register<T: Mapped>(&mut self) -> MappingResult<&mut Self> {
        self.register_with::<T, _>(Ok)
    }

    /// Registers `T`, letting `configure` extend its definition (id rule, validator, extra
    /// attributes).
    ///
    /// Registering a class again replaces the previous registration.
    pub fn register_with<T, C>(&mut self, configure: C) -> MappingResult<&mut Self>
    where
        T: Mapped,
        C: FnOnce(DefinitionBuilder<T>) -> MappingResult<DefinitionBuilder<T>>,
    {
        let definition = configure(T::define(DefinitionBuilder::new())?)?.build();
        let class = definition.class();

        let factory: MapperFactory = Box::new(move |registry, backend, options| {
            Arc::new(Mapper::new(definition, backend, registry, options)) as Arc<dyn AnyMapper>
        });

        if self.factories.insert(class, factory).is_some() {
            info!("event=mapper_replaced module=registry class={class}");
        } else {
            debug!("event=mapper_registered module=registry class={class}");
        }

        Ok(self)
    }

    /// Sets the options shared by every mapper.
    pub fn options(&mut self, options: MapperOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> Arc<MapperRegistry> {
        let RegistryBuilder {
            backend,
            options,
            factories,
        } = self;

        Arc::new_cyclic(|registry: &Weak<MapperRegistry>| {
            let mappers = factories
                .into_iter()
                .map(|(class, factory)| (class, factory(registry.clone(), backend.clone(), options)))
                .collect();

            MapperRegistry {
                backend,
                options,
                mappers,
            }
        })
    }
}

/// Immutable map from class name to mapper.
#[derive(Debug)]
pub struct MapperRegistry {
    backend: Arc<dyn StoreBackend>,
    options: MapperOptions,
    mappers: IndexMap<&'static str, Arc<dyn AnyMapper>>,
}

impl MapperRegistry {
    pub fn builder(backend: impl StoreBackend + 'static) -> RegistryBuilder {
        RegistryBuilder {
            backend: Arc::new(backend),
            options: MapperOptions::default(),
            factories: IndexMap::new(),
        }
    }

    /// Returns the mapper registered for `class`.
    pub fn lookup(&self, class: &str) -> MappingResult<Arc<dyn AnyMapper>> {
        self.mappers
            .get(class)
            .cloned()
            .ok_or_else(|| MappingError::NotRegistered(class.to_string()))
    }

    pub fn has(&self, class: &str) -> bool {
        self.mappers.contains_key(class)
    }

    /// Returns the typed mapper of `T`.
    pub fn mapper<T: Mapped>(&self) -> MappingResult<Arc<Mapper<T>>> {
        self.lookup(T::class_name())?
            .into_any()
            .downcast::<Mapper<T>>()
            .map_err(|_| MappingError::NotRegistered(T::class_name().to_string()))
    }

    /// Registered class names in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.mappers.keys().copied()
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    pub fn options(&self) -> MapperOptions {
        self.options
    }

    /// Declares the store indexes of every `indexed` attribute of every registered class.
    pub async fn declare_indexes(&self) -> MappingResult<()> {
        for mapper in self.mappers.values() {
            mapper.declare_indexes().await?;
        }

        Ok(())
    }
}
