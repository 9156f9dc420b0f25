//! Main docmap crate: object-document mapping for schemaless document stores.
//!
//! This crate is the primary entry point for users of the docmap framework.
//! It re-exports the core types, the `Mapped` derive and the storage backends.
//!
//! # Features
//!
//! - **Declared persisted shapes** - Only declared attributes are stored, in declaration order
//! - **Associations** - Embedded or referenced, with batch loading of references
//! - **Identity map** - One in-memory instance per stored object while it is in use
//! - **Composable queries** - Predicates over attribute handles, lazily executed
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Mapped)]
//! #[mapped(collection = "authors")]
//! pub struct Author {
//!     #[mapped(id)]
//!     pub id: Option<Id>,
//!     pub name: String,
//! }
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Mapped)]
//! #[mapped(collection = "books")]
//! pub struct Book {
//!     #[mapped(id)]
//!     pub id: Option<Id>,
//!     pub title: String,
//!     pub price: f64,
//!     pub author: Association<Author>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build().await?;
//!
//!     let mut builder = MapperRegistry::builder(store);
//!     builder.register::<Author>()?.register::<Book>()?;
//!     let registry = builder.build();
//!
//!     let authors = registry.mapper::<Author>()?;
//!     let books = registry.mapper::<Book>()?;
//!
//!     let mut author = Author { name: "Herman Melville".into(), ..Author::default() };
//!     authors.insert(&mut author).await?;
//!
//!     let mut book = Book {
//!         title: "Moby Dick".into(),
//!         price: 9.5,
//!         author: author.into(),
//!         ..Book::default()
//!     };
//!     books.insert(&mut book).await?;
//!
//!     // References come back unloaded; load them for the whole batch at once.
//!     let mut cheap = books.select(|b| b.attribute("price").lt(10.0)).to_vec().await?;
//!     books.load_association(&mut cheap, "author").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmap;

pub mod prelude;

pub use docmap_core::{
    attribute, backend, codec, definition, dereference, document, error, id, identity, index,
    mapper, options, query, registry, retrieval, value,
};
pub use docmap_core::{
    Association, Id, Mapper, MapperOptions, MapperRegistry, MappingError, MappingResult, Opaque,
    Reference, Retrieval,
};
pub use docmap_macros::Mapped;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmap_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
