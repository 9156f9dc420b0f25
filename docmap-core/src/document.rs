//! Core traits for mapped domain types.
//!
//! Every type persisted through a [`Mapper`](crate::mapper::Mapper) implements [`Mapped`].
//! The trait is usually derived with `#[derive(Mapped)]`, which builds the field-injection
//! table from the struct's fields, but it can be implemented by hand as well.
//!
//! [`ErasedObject`] is the type-erased view of a mapped object. It lets associations,
//! the registry and the dereferencer move objects of different classes through one channel.

use bson::{Bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use std::{any::Any, fmt, sync::Arc};

use crate::{
    definition::DefinitionBuilder,
    error::MappingResult,
    id::Id,
};

/// Key under which documents carry the object id.
pub const ID_FIELD: &str = "id";

/// Reserved key carrying class (and, for references, id) metadata.
pub const METADATA_KEY: &str = "__metadata__";

/// Key of the class name inside the metadata document.
pub const CLASS_KEY: &str = "class";

/// A domain type with a persisted shape.
///
/// # Example
///
/// ```ignore
/// use docmap::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Option<Id>,
///     pub name: String,
/// }
///
/// impl Mapped for User {
///     fn class_name() -> &'static str {
///         "User"
///     }
///
///     fn id(&self) -> Option<&Id> {
///         self.id.as_ref()
///     }
///
///     fn set_id(&mut self, id: Id) {
///         self.id = Some(id);
///     }
///
///     fn define(definition: DefinitionBuilder<Self>) -> MappingResult<DefinitionBuilder<Self>> {
///         definition.attribute("name", |u: &User| &u.name, |u: &mut User| &mut u.name)
///     }
/// }
/// ```
///
/// The serde bounds are only used for the opaque fallback encoding: the persisted shape is
/// always the one declared in [`Mapped::define`].
pub trait Mapped: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Name identifying the class in metadata and in the registry.
    fn class_name() -> &'static str;

    /// Name of the collection documents of this class are stored in.
    fn collection_name() -> &'static str {
        Self::class_name()
    }

    /// Returns the id assigned by the mapper, if the object has been persisted.
    fn id(&self) -> Option<&Id>;

    /// Assigns the id. Called by the mapper after an insert or while deserializing.
    fn set_id(&mut self, id: Id);

    /// Declares the mapped attributes of the class.
    fn define(definition: DefinitionBuilder<Self>) -> MappingResult<DefinitionBuilder<Self>> {
        Ok(definition)
    }
}

/// Type-erased view of a mapped object.
pub trait ErasedObject: Send + Sync {
    /// Class name of the concrete type.
    fn object_class(&self) -> &'static str;

    /// Id of the object, if persisted.
    fn object_id(&self) -> Option<&Id>;

    /// Returns the object as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts the shared object into a shared `Any`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Renders the whole object with serde, for the opaque fallback encoding.
    fn to_opaque(&self) -> MappingResult<Bson>;
}

impl<T: Mapped> ErasedObject for T {
    fn object_class(&self) -> &'static str {
        <T as Mapped>::class_name()
    }

    fn object_id(&self) -> Option<&Id> {
        self.id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn to_opaque(&self) -> MappingResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }
}

impl dyn ErasedObject + '_ {
    /// Attempts to downcast a reference to a specific mapped type.
    pub fn downcast_ref<T: Mapped>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn ErasedObject + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedObject")
            .field("class", &self.object_class())
            .field("id", &self.object_id())
            .finish()
    }
}

/// Recovers the concrete shared object behind an erased one.
///
/// Returns `None` when the object is of another class.
pub fn downcast_object<T: Mapped>(object: Arc<dyn ErasedObject>) -> Option<Arc<T>> {
    if !object.as_any().is::<T>() {
        return None;
    }

    object.into_any().downcast::<T>().ok()
}
