//! An object-document mapping layer for schemaless document stores.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Mapped classes** ([`document`], [`definition`]) - The `Mapped` trait and the attribute
//!   definitions that drive serialization
//! - **Attributes and values** ([`attribute`], [`value`]) - Ordered attribute sets, tagged
//!   values and field type conversions
//! - **Queries** ([`query`]) - Attribute handles, expression trees and the visitor stores use
//!   to translate them
//! - **Store backend abstraction** ([`backend`], [`index`]) - The interface the mapping layer
//!   calls on a document store
//! - **Registry and mappers** ([`registry`], [`mapper`], [`identity`]) - Class-to-mapper lookup,
//!   persistence operations and the identity map
//! - **Results and associations** ([`retrieval`], [`dereference`]) - Lazy query results and
//!   batch loading of referenced objects
//! - **Error handling** ([`error`]) - Error types and result types
//! - **Configuration** ([`options`]) - Mapper policies
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Mapped)]
//! #[mapped(collection = "books")]
//! pub struct Book {
//!     #[mapped(id)]
//!     pub id: Option<Id>,
//!     pub title: String,
//!     #[mapped(embedded)]
//!     pub author: Association<Author>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod attribute;
pub mod backend;
pub mod codec;
pub mod definition;
pub mod dereference;
pub mod document;
pub mod error;
pub mod id;
pub mod identity;
pub mod index;
pub mod mapper;
pub mod options;
pub mod query;
pub mod registry;
pub mod retrieval;
pub mod value;

pub use attribute::{AttributeDescriptor, AttributeOptions, AttributeSet};
pub use backend::{StoreBackend, StoreBackendBuilder};
pub use definition::{Accessor, DefinitionBuilder, MapperDefinition, Validator};
pub use dereference::Dereferencer;
pub use document::{ErasedObject, Mapped, downcast_object};
pub use error::{DocumentStoreError, DocumentStoreResult, MappingError, MappingResult};
pub use id::{Id, Reference};
pub use identity::IdentityMap;
pub use index::{Index, IndexOptions, IndexOrder};
pub use mapper::{Mapper, Target};
pub use options::{MapperOptions, UnknownAttributePolicy, UnmappedValuePolicy};
pub use query::{Expr, FieldOp, Filter, Query, QueryAttribute, QueryAttributes, SortDirection};
pub use registry::{AnyMapper, MapperRegistry, RegistryBuilder};
pub use retrieval::Retrieval;
pub use value::{Association, FieldType, Opaque, TypeTag, Value};
