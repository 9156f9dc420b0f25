//! In-memory document storage backend for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Ordered collections** - Documents come back in insertion order unless sorted
//! - **Full query support** - Filtering (including regular expressions), sorting, pagination
//! - **Atomic increments** - Numeric fields are incremented under the write lock
//! - **Index bookkeeping** - Declared and active indexes per collection
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build().await?;
//!
//!     let mut builder = MapperRegistry::builder(store);
//!     builder.register::<User>()?;
//!     let registry = builder.build();
//!
//!     let users = registry.mapper::<User>()?;
//!     let mut user = User { name: "Alice".to_string(), ..User::default() };
//!     users.insert(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
