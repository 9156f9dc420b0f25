//! Field values and the conversions between Rust field types and them.
//!
//! Reading an attribute yields a [`Value`], a tagged variant that already says what kind of
//! thing the field holds. The mapper classifies values by their tag instead of probing
//! capabilities at runtime. [`FieldType`] converts typed struct fields to and from values.

use bson::{Bson, DateTime, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fmt, ops::Deref, sync::Arc};
use uuid::Uuid;

use crate::{
    document::{ErasedObject, Mapped, downcast_object},
    error::{MappingError, MappingResult},
    id::{Id, Reference},
};

/// The value of one mapped attribute.
#[derive(Clone)]
pub enum Value {
    /// A BSON value the store may hold natively.
    Native(Bson),
    /// A collection; elements are classified one by one.
    List(Vec<Value>),
    /// A mapped object, embedded or referenced depending on the attribute.
    Object(Arc<dyn ErasedObject>),
    /// An association that has not been loaded yet.
    Reference(Reference),
    /// A value without native representation; stored as an opaque blob when embedded.
    Opaque(Bson),
}

impl Value {
    pub const NULL: Value = Value::Native(Bson::Null);

    /// Short description of the variant, used in error messages.
    pub fn kind(&self) -> String {
        match self {
            Value::Native(bson) => format!("{:?}", bson.element_type()),
            Value::List(_) => "List".to_string(),
            Value::Object(object) => format!("Object({})", object.object_class()),
            Value::Reference(reference) => format!("Reference({})", reference.class),
            Value::Opaque(_) => "Opaque".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Native(Bson::Null))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Native(bson) => f.debug_tuple("Native").field(bson).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(object) => f.debug_tuple("Object").field(object).finish(),
            Value::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
            Value::Opaque(bson) => f.debug_tuple("Opaque").field(bson).finish(),
        }
    }
}

impl From<Bson> for Value {
    fn from(value: Bson) -> Self {
        Value::Native(value)
    }
}

/// Declared type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Boolean,
    Integer,
    Float,
    DateTime,
    Uuid,
    Id,
    Document,
    List(Box<TypeTag>),
    Optional(Box<TypeTag>),
    Association(&'static str),
    Opaque,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::List(inner) => write!(f, "List<{inner}>"),
            TypeTag::Optional(inner) => write!(f, "Option<{inner}>"),
            TypeTag::Association(class) => write!(f, "Association<{class}>"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Conversion between a struct field and a [`Value`].
pub trait FieldType: Sized + Send + Sync + 'static {
    /// Declared type recorded on the attribute descriptor. `None` means untyped.
    fn type_tag() -> Option<TypeTag>;

    fn to_value(&self) -> MappingResult<Value>;

    fn from_value(value: Value) -> MappingResult<Self>;
}

fn expected<T: FieldType>() -> String {
    T::type_tag()
        .map(|tag| tag.to_string())
        .unwrap_or_else(|| "any value".to_string())
}

fn mismatch<T: FieldType>(value: &Value) -> MappingError {
    MappingError::mismatch(expected::<T>(), value.kind())
}

impl FieldType for String {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::String)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::String(self.clone())))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::String(value)) => Ok(value),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for bool {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Boolean)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::Boolean(*self)))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Boolean(value)) => Ok(value),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for i64 {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Integer)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::Int64(*self)))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Int64(value)) => Ok(value),
            Value::Native(Bson::Int32(value)) => Ok(value as i64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for i32 {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Integer)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::Int32(*self)))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Int32(value)) => Ok(value),
            Value::Native(Bson::Int64(value)) => i32::try_from(value)
                .map_err(|_| MappingError::mismatch("i32", format!("Int64({value})"))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for f64 {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Float)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::Double(*self)))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Double(value)) => Ok(value),
            Value::Native(Bson::Int32(value)) => Ok(value as f64),
            Value::Native(Bson::Int64(value)) => Ok(value as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for DateTime {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::DateTime)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::DateTime(*self)))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::DateTime(value)) => Ok(value),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for chrono::DateTime<chrono::Utc> {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::DateTime)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::DateTime(DateTime::from_chrono(*self))))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::DateTime(value)) => Ok(value.to_chrono()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for Uuid {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Uuid)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Id::Uuid(*self).to_bson()))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match &value {
            Value::Native(bson) => match Id::from_bson(bson) {
                Some(Id::Uuid(uuid)) => Ok(uuid),
                _ => Err(mismatch::<Self>(&value)),
            },
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FieldType for Id {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Id)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(self.to_bson()))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match &value {
            Value::Native(bson) => Id::from_bson(bson).ok_or_else(|| mismatch::<Self>(&value)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FieldType for Document {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Document)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(Bson::Document(self.clone())))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Document(document)) => Ok(document),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FieldType for Bson {
    fn type_tag() -> Option<TypeTag> {
        None
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Native(self.clone()))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(bson) => Ok(bson),
            Value::List(items) => Ok(Bson::Array(
                items
                    .into_iter()
                    .map(Bson::from_value)
                    .collect::<MappingResult<Vec<_>>>()?,
            )),
            Value::Reference(reference) => Ok(Bson::Document(reference.to_document())),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<F: FieldType> FieldType for Option<F> {
    fn type_tag() -> Option<TypeTag> {
        F::type_tag().map(|tag| TypeTag::Optional(Box::new(tag)))
    }

    fn to_value(&self) -> MappingResult<Value> {
        match self {
            Some(value) => value.to_value(),
            None => Ok(Value::NULL),
        }
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        if value.is_null() {
            return Ok(None);
        }

        F::from_value(value).map(Some)
    }
}

impl<F: FieldType> FieldType for Vec<F> {
    fn type_tag() -> Option<TypeTag> {
        F::type_tag().map(|tag| TypeTag::List(Box::new(tag)))
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::List(
            self.iter()
                .map(FieldType::to_value)
                .collect::<MappingResult<Vec<_>>>()?,
        ))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(F::from_value).collect(),
            Value::Native(Bson::Array(items)) => items
                .into_iter()
                .map(|item| F::from_value(Value::Native(item)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// An association with another mapped class.
///
/// Whether the association is embedded or referenced is decided by the attribute's options.
/// Referenced associations come back from the store as [`Association::Reference`] and turn
/// into [`Association::Loaded`] once loaded with
/// [`Mapper::load_association`](crate::mapper::Mapper::load_association).
#[derive(Serialize, Deserialize)]
pub enum Association<U> {
    Empty,
    Loaded(Arc<U>),
    Reference(Reference),
}

impl<U: Mapped> Association<U> {
    /// Wraps an object in a loaded association.
    pub fn new(object: U) -> Self {
        Association::Loaded(Arc::new(object))
    }

    /// Returns the associated object if it is loaded.
    pub fn get(&self) -> Option<&U> {
        match self {
            Association::Loaded(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the shared associated object if it is loaded.
    pub fn shared(&self) -> Option<Arc<U>> {
        match self {
            Association::Loaded(object) => Some(object.clone()),
            _ => None,
        }
    }

    /// Returns the reference to the associated object, loaded or not.
    ///
    /// A loaded object yields a reference only once it has been persisted.
    pub fn reference(&self) -> Option<Reference> {
        match self {
            Association::Empty => None,
            Association::Loaded(object) => object
                .id()
                .map(|id| Reference::new(U::class_name(), id.clone())),
            Association::Reference(reference) => Some(reference.clone()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Association::Loaded(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Association::Empty)
    }
}

impl<U> Default for Association<U> {
    fn default() -> Self {
        Association::Empty
    }
}

impl<U> Clone for Association<U> {
    fn clone(&self) -> Self {
        match self {
            Association::Empty => Association::Empty,
            Association::Loaded(object) => Association::Loaded(object.clone()),
            Association::Reference(reference) => Association::Reference(reference.clone()),
        }
    }
}

impl<U: Mapped> fmt::Debug for Association<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Association::Empty => f.write_str("Empty"),
            Association::Loaded(object) => f
                .debug_struct("Loaded")
                .field("class", &U::class_name())
                .field("id", &object.id())
                .finish(),
            Association::Reference(reference) => {
                f.debug_tuple("Reference").field(reference).finish()
            }
        }
    }
}

impl<U: Mapped> From<U> for Association<U> {
    fn from(object: U) -> Self {
        Association::new(object)
    }
}

impl<U: Mapped> From<Arc<U>> for Association<U> {
    fn from(object: Arc<U>) -> Self {
        Association::Loaded(object)
    }
}

impl<U: Mapped> FieldType for Association<U> {
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Association(U::class_name()))
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(match self {
            Association::Empty => Value::NULL,
            Association::Loaded(object) => Value::Object(object.clone()),
            Association::Reference(reference) => Value::Reference(reference.clone()),
        })
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(Bson::Null) => Ok(Association::Empty),
            Value::Object(object) => {
                let found = object.object_class();
                downcast_object::<U>(object)
                    .map(Association::Loaded)
                    .ok_or_else(|| MappingError::mismatch(U::class_name(), found))
            }
            Value::Reference(reference) if reference.class == U::class_name() => {
                Ok(Association::Reference(reference))
            }
            // Objects stored through the opaque fallback come back as their serde form.
            Value::Native(bson @ Bson::Document(_)) => {
                Ok(Association::new(deserialize_from_bson::<U>(bson)?))
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// A field stored as an opaque blob.
///
/// Wraps any serde type that has no mapper of its own. The attribute holding it must be
/// embedded; otherwise the value is handled by the unmapped-value policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opaque<T>(pub T);

impl<T> Deref for Opaque<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> FieldType for Opaque<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn type_tag() -> Option<TypeTag> {
        Some(TypeTag::Opaque)
    }

    fn to_value(&self) -> MappingResult<Value> {
        Ok(Value::Opaque(serialize_to_bson(&self.0)?))
    }

    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Native(bson) | Value::Opaque(bson) => Ok(Opaque(deserialize_from_bson(bson)?)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_convert_both_ways() {
        let value = "Moby Dick".to_string().to_value().unwrap();
        assert_eq!(String::from_value(value).unwrap(), "Moby Dick");

        let value = 42i64.to_value().unwrap();
        assert_eq!(i64::from_value(value).unwrap(), 42);

        assert_eq!(f64::from_value(Value::Native(Bson::Int32(3))).unwrap(), 3.0);
    }

    #[test]
    fn conversion_failures_name_both_types() {
        let error = String::from_value(Value::Native(Bson::Int32(1))).unwrap_err();
        match error {
            MappingError::TypeMismatch { expected, found } => {
                assert_eq!(expected, "String");
                assert_eq!(found, "Int32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn options_map_null_to_none() {
        assert_eq!(Option::<String>::from_value(Value::NULL).unwrap(), None);
        assert!(None::<String>.to_value().unwrap().is_null());
    }

    #[test]
    fn nested_lists_keep_their_shape() {
        let nested = vec![vec![1i64, 2], vec![3]];
        let value = nested.to_value().unwrap();
        assert!(matches!(&value, Value::List(outer) if outer.len() == 2));
        assert_eq!(Vec::<Vec<i64>>::from_value(value).unwrap(), nested);
    }

    #[test]
    fn type_tags_describe_wrappers() {
        assert_eq!(
            Vec::<Option<String>>::type_tag().unwrap().to_string(),
            "List<Option<String>>"
        );
        assert_eq!(Bson::type_tag(), None);
    }

    #[test]
    fn opaque_values_keep_their_serde_form() {
        let value = Opaque(vec!["a".to_string(), "b".to_string()]).to_value().unwrap();
        assert!(matches!(value, Value::Opaque(Bson::Array(_))));

        let restored = Opaque::<Vec<String>>::from_value(value).unwrap();
        assert_eq!(restored.0, vec!["a", "b"]);
    }
}
