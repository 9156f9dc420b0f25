#![allow(dead_code)]

use bson::Bson;
use docmap::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Serialize, Deserialize, Mapped)]
#[mapped(collection = "authors")]
pub struct Author {
    #[mapped(id)]
    pub id: Option<Id>,
    #[mapped(indexed)]
    pub name: String,
    pub born: Option<i32>,
}

impl Author {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Mapped)]
#[mapped(collection = "books", validate = Book::has_title)]
pub struct Book {
    #[mapped(id)]
    pub id: Option<Id>,
    pub title: String,
    pub price: f64,
    pub copies_sold: i64,
    pub tags: Vec<String>,
    pub author: Association<Author>,
    #[mapped(skip)]
    pub rank: u32,
}

impl Book {
    pub fn titled(title: &str, price: f64) -> Self {
        Self {
            title: title.to_string(),
            price,
            ..Self::default()
        }
    }

    fn has_title(&self) -> bool {
        !self.title.is_empty()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Mapped)]
pub struct Address {
    #[mapped(id)]
    pub id: Option<Id>,
    pub street: String,
    pub city: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imprints {
    pub founded: i32,
    pub names: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Mapped)]
#[mapped(collection = "publishers", derive_id = Publisher::slug)]
pub struct Publisher {
    #[mapped(id)]
    pub id: Option<Id>,
    pub name: String,
    #[mapped(embedded)]
    pub address: Association<Address>,
    #[mapped(embedded, rename = "imprint_list")]
    pub imprints: Opaque<Imprints>,
}

impl Publisher {
    fn slug(&self) -> Option<Id> {
        Some(Id::from(self.name.to_lowercase().replace(' ', "-")))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Mapped)]
#[mapped(class = "Memo", collection = "memos")]
pub struct Note {
    #[mapped(id)]
    pub id: Option<Id>,
    pub body: String,
    pub payload: Bson,
}

/// Registry over a fresh in-memory store with every test class registered.
///
/// The returned store shares its data with the registry's.
pub fn registry() -> (Arc<MapperRegistry>, InMemoryStore) {
    registry_with(MapperOptions::default())
}

pub fn registry_with(options: MapperOptions) -> (Arc<MapperRegistry>, InMemoryStore) {
    let store = InMemoryStore::new();

    let mut builder = MapperRegistry::builder(store.clone());
    builder
        .options(options)
        .register::<Author>()
        .unwrap()
        .register::<Book>()
        .unwrap()
        .register::<Address>()
        .unwrap()
        .register::<Publisher>()
        .unwrap()
        .register::<Note>()
        .unwrap();

    (builder.build(), store)
}

/// Inserts the given books and returns them with their ids set.
pub async fn seed_books(books: &Mapper<Book>, titles: &[(&str, f64)]) -> Vec<Book> {
    let mut inserted = Vec::with_capacity(titles.len());
    for (title, price) in titles {
        let mut book = Book::titled(title, *price);
        books.insert(&mut book).await.unwrap();
        inserted.push(book);
    }
    inserted
}
