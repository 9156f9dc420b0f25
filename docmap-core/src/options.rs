//! Mapper configuration.

use serde::{Deserialize, Serialize};

/// What to do with document fields that match no attribute while deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAttributePolicy {
    /// Skip the field.
    #[default]
    Ignore,
    /// Fail with [`MappingError::UnknownAttribute`](crate::error::MappingError::UnknownAttribute).
    Reject,
}

/// What to do with attribute values the store cannot hold natively, that have no registered
/// mapper and whose attribute is not embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedValuePolicy {
    /// Leave the attribute out of the document and log a warning.
    #[default]
    Omit,
    /// Fail with [`MappingError::Unserializable`](crate::error::MappingError::Unserializable).
    Reject,
}

/// Options shared by every mapper of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    pub unknown_attributes: UnknownAttributePolicy,
    pub unmapped_values: UnmappedValuePolicy,
}

impl MapperOptions {
    /// Options rejecting both unknown fields and unmapped values.
    pub fn strict() -> Self {
        Self {
            unknown_attributes: UnknownAttributePolicy::Reject,
            unmapped_values: UnmappedValuePolicy::Reject,
        }
    }
}
