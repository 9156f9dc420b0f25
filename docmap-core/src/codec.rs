//! Value encoding between attribute values and stored BSON.
//!
//! Every attribute value is classified exactly once and then encoded according to its
//! classification:
//!
//! | classification  | stored as                                              |
//! |-----------------|--------------------------------------------------------|
//! | native          | the value itself                                       |
//! | collection      | an array, elements encoded recursively                 |
//! | embeddable      | a nested document tagged with `__metadata__: {class}`  |
//! | referenceable   | a marker `{__metadata__: {class, id}}`                 |
//! | marker          | the marker it already is                               |
//! | opaque          | a binary blob (user-defined subtype `0x80`)            |
//! | unmapped        | nothing, or an error, per [`UnmappedValuePolicy`]      |

use bson::{Binary, Bson, Document, de::deserialize_from_slice, doc, ser::serialize_to_vec, spec::BinarySubtype};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    document::{CLASS_KEY, ErasedObject, METADATA_KEY},
    error::{MappingError, MappingResult},
    id::Reference,
    options::UnmappedValuePolicy,
    registry::{AnyMapper, MapperRegistry},
    value::Value,
};

/// Binary subtype marking opaque blobs.
pub const OPAQUE_SUBTYPE: u8 = 0x80;

#[derive(Serialize, Deserialize)]
struct Envelope {
    value: Bson,
}

/// Wraps a value into an opaque binary blob.
pub fn encode_opaque(value: Bson) -> MappingResult<Bson> {
    let bytes = serialize_to_vec(&Envelope { value })?;
    Ok(Bson::Binary(Binary {
        subtype: BinarySubtype::UserDefined(OPAQUE_SUBTYPE),
        bytes,
    }))
}

/// Unwraps an opaque blob. Returns `None` for binaries that are not opaque blobs.
pub fn decode_opaque(binary: &Binary) -> Option<MappingResult<Bson>> {
    if binary.subtype != BinarySubtype::UserDefined(OPAQUE_SUBTYPE) {
        return None;
    }

    Some(
        deserialize_from_slice::<Envelope>(&binary.bytes)
            .map(|envelope| envelope.value)
            .map_err(MappingError::from),
    )
}

/// How one value is going to be stored.
pub(crate) enum Classification {
    Native(Bson),
    Collection(Vec<Value>),
    Embeddable(Arc<dyn ErasedObject>, Arc<dyn AnyMapper>),
    Referenceable(Arc<dyn ErasedObject>),
    Marker(Reference),
    Opaque(Bson),
    Unmapped(String),
}

/// Encoder/decoder bound to one mapper's class and its registry.
pub(crate) struct Codec<'a> {
    registry: &'a MapperRegistry,
    class: &'static str,
}

impl<'a> Codec<'a> {
    pub(crate) fn new(registry: &'a MapperRegistry, class: &'static str) -> Self {
        Self { registry, class }
    }

    pub(crate) fn classify(&self, value: Value, embedded: bool) -> MappingResult<Classification> {
        Ok(match value {
            Value::Native(bson) if self.registry.backend().can_serialize(&bson) => {
                Classification::Native(bson)
            }
            Value::Native(bson) | Value::Opaque(bson) => {
                if embedded {
                    Classification::Opaque(bson)
                } else {
                    Classification::Unmapped(format!("{:?}", bson.element_type()))
                }
            }
            Value::List(items) => Classification::Collection(items),
            Value::Reference(reference) => Classification::Marker(reference),
            Value::Object(object) => match self.registry.lookup(object.object_class()) {
                Ok(mapper) if embedded => Classification::Embeddable(object, mapper),
                Ok(_) => Classification::Referenceable(object),
                Err(_) if embedded => Classification::Opaque(object.to_opaque()?),
                Err(_) => Classification::Unmapped(object.object_class().to_string()),
            },
        })
    }

    /// Encodes the value of `attribute`. `None` means the value is left out of the document.
    pub(crate) fn encode(
        &self,
        attribute: &str,
        embedded: bool,
        value: Value,
    ) -> MappingResult<Option<Bson>> {
        let encoded = match self.classify(value, embedded)? {
            Classification::Native(bson) => bson,
            Classification::Collection(items) => {
                let mut array = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(bson) = self.encode(attribute, embedded, item)? {
                        array.push(bson);
                    }
                }
                Bson::Array(array)
            }
            Classification::Embeddable(object, mapper) => {
                let mut document = mapper.serialize_object(object.as_ref())?;
                document.insert(METADATA_KEY, doc! { CLASS_KEY: object.object_class() });
                Bson::Document(document)
            }
            Classification::Referenceable(object) => {
                let id = object.object_id().ok_or_else(|| MappingError::DanglingReference {
                    class: object.object_class().to_string(),
                    attribute: attribute.to_string(),
                })?;
                Bson::Document(Reference::new(object.object_class(), id.clone()).to_document())
            }
            Classification::Marker(reference) => Bson::Document(reference.to_document()),
            Classification::Opaque(bson) => encode_opaque(bson)?,
            Classification::Unmapped(kind) => {
                return match self.registry.options().unmapped_values {
                    UnmappedValuePolicy::Omit => {
                        warn!(
                            "event=value_omitted module=mapper class={} attribute={attribute} kind={kind}",
                            self.class
                        );
                        Ok(None)
                    }
                    UnmappedValuePolicy::Reject => Err(MappingError::Unserializable {
                        class: self.class,
                        attribute: attribute.to_string(),
                    }),
                };
            }
        };

        Ok(Some(encoded))
    }

    /// Decodes a stored value back into an attribute value.
    pub(crate) fn decode(&self, bson: Bson) -> MappingResult<Value> {
        match bson {
            Bson::Document(document) => self.decode_document(document),
            Bson::Array(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| self.decode(item))
                    .collect::<MappingResult<Vec<_>>>()?,
            )),
            Bson::Binary(binary) => match decode_opaque(&binary) {
                Some(inner) => Ok(Value::Native(inner?)),
                None => Ok(Value::Native(Bson::Binary(binary))),
            },
            other => Ok(Value::Native(other)),
        }
    }

    fn decode_document(&self, document: Document) -> MappingResult<Value> {
        if let Some(reference) = Reference::from_document(&document) {
            return Ok(Value::Reference(reference));
        }

        let class = document
            .get_document(METADATA_KEY)
            .ok()
            .and_then(|metadata| metadata.get_str(CLASS_KEY).ok())
            .map(str::to_string);

        match class {
            Some(class) => {
                let mapper = self.registry.lookup(&class)?;
                Ok(Value::Object(mapper.deserialize_object(document)?))
            }
            None => Ok(Value::Native(Bson::Document(document))),
        }
    }
}
