//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```

pub use docmap_core::{
    attribute::{AttributeOptions, AttributeSet},
    backend::{StoreBackend, StoreBackendBuilder},
    definition::DefinitionBuilder,
    dereference::Dereferencer,
    document::Mapped,
    error::{DocumentStoreError, DocumentStoreResult, MappingError, MappingResult},
    id::{Id, Reference},
    index::{Index, IndexOptions, IndexOrder},
    mapper::{Mapper, Target},
    options::{MapperOptions, UnknownAttributePolicy, UnmappedValuePolicy},
    query::{Expr, Filter, Query, QueryAttribute, QueryAttributes, SortDirection},
    registry::{MapperRegistry, RegistryBuilder},
    retrieval::Retrieval,
    value::{Association, FieldType, Opaque, Value},
};
pub use docmap_macros::Mapped;
