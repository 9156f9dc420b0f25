//! Object identifiers and reference markers.

use bson::{Binary, Bson, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::document::{CLASS_KEY, ID_FIELD, METADATA_KEY};

/// Identifier of a persisted object.
///
/// Stores generate UUIDs when no id is supplied; string and integer ids come from
/// caller-defined id rules (for example a slug derived from a title).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Uuid(Uuid),
    Int(i64),
    String(String),
}

impl Id {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Id::Uuid(Uuid::new_v4())
    }

    /// Converts this id into its stored BSON form.
    pub fn to_bson(&self) -> Bson {
        match self {
            Id::Uuid(uuid) => Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid,
                bytes: uuid.as_bytes().to_vec(),
            }),
            Id::Int(value) => Bson::Int64(*value),
            Id::String(value) => Bson::String(value.clone()),
        }
    }

    /// Reads an id from its stored BSON form.
    ///
    /// Returns `None` for values that cannot be ids (documents, floats, ...).
    pub fn from_bson(bson: &Bson) -> Option<Self> {
        match bson {
            Bson::String(value) => Some(Id::String(value.clone())),
            Bson::Int32(value) => Some(Id::Int(*value as i64)),
            Bson::Int64(value) => Some(Id::Int(*value)),
            Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid => {
                Uuid::from_slice(&binary.bytes).ok().map(Id::Uuid)
            }
            _ => None,
        }
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Uuid(uuid) => write!(f, "{uuid}"),
            Id::Int(value) => write!(f, "{value}"),
            Id::String(value) => f.write_str(value),
        }
    }
}

impl From<Uuid> for Id {
    fn from(value: Uuid) -> Self {
        Id::Uuid(value)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Int(value)
    }
}

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Id::Int(value as i64)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::String(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::String(value.to_string())
    }
}

impl From<&Id> for Id {
    fn from(value: &Id) -> Self {
        value.clone()
    }
}

impl From<Id> for Bson {
    fn from(value: Id) -> Self {
        value.to_bson()
    }
}

/// A pointer to a persisted object of another mapped class.
///
/// Two references are equal when both the class and the id are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub class: String,
    pub id: Id,
}

impl Reference {
    pub fn new(class: impl Into<String>, id: impl Into<Id>) -> Self {
        Self { class: class.into(), id: id.into() }
    }

    /// Encodes this reference as a marker document: `{__metadata__: {class, id}}`.
    pub fn to_document(&self) -> Document {
        doc! {
            METADATA_KEY: {
                CLASS_KEY: self.class.as_str(),
                ID_FIELD: self.id.to_bson(),
            }
        }
    }

    /// Recognizes a marker document.
    ///
    /// A marker holds nothing but the metadata key, and its metadata carries both a class
    /// name and an id. Embedded documents carry attributes next to their metadata and are
    /// therefore never mistaken for markers.
    pub fn from_document(document: &Document) -> Option<Self> {
        if document.len() != 1 {
            return None;
        }

        let metadata = document.get_document(METADATA_KEY).ok()?;
        let class = metadata.get_str(CLASS_KEY).ok()?;
        let id = Id::from_bson(metadata.get(ID_FIELD)?)?;

        Some(Reference::new(class, id))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}
