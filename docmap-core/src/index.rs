//! Store index declarations.
//!
//! Mappers declare indexes per attribute; stores remember the declarations and activate them
//! on demand (see [`Mapper::reindex`](crate::mapper::Mapper::reindex)).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort order of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexOrder {
    #[default]
    Ascending,
    Descending,
}

impl IndexOrder {
    /// Numeric direction as used by document stores (`1` or `-1`).
    pub fn direction(&self) -> i32 {
        match self {
            IndexOrder::Ascending => 1,
            IndexOrder::Descending => -1,
        }
    }

    pub fn from_direction(direction: i64) -> Self {
        if direction < 0 {
            IndexOrder::Descending
        } else {
            IndexOrder::Ascending
        }
    }
}

/// Options for declaring an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub unique: bool,
    pub order: IndexOrder,
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self { unique: true, ..Self::default() }
    }

    pub fn with_order(mut self, order: IndexOrder) -> Self {
        self.order = order;
        self
    }
}

/// An index on one attribute of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub collection: String,
    pub attribute: String,
    pub unique: bool,
    pub order: IndexOrder,
}

impl Index {
    pub fn new(
        collection: impl Into<String>,
        attribute: impl Into<String>,
        options: IndexOptions,
    ) -> Self {
        Self {
            collection: collection.into(),
            attribute: attribute.into(),
            unique: options.unique,
            order: options.order,
        }
    }

    /// Store-level name of the index, e.g. `title_1`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.attribute, self.order.direction())
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection, self.name())
    }
}
