mod common;

use bson::{Bson, doc};
use docmap::prelude::*;
use std::sync::Arc;

use common::{Author, Book, Note, Publisher, registry, registry_with, seed_books};

#[tokio::test]
async fn serialize_follows_declaration_order() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let mut book = Book::titled("Moby Dick", 9.5);
    book.tags = vec!["sea".into(), "whales".into()];
    book.rank = 7;

    let document = books.serialize(&book).unwrap();
    let keys = document.keys().map(String::as_str).collect::<Vec<_>>();

    assert_eq!(keys, vec!["title", "price", "copies_sold", "tags", "author"]);
    assert_eq!(books.attributes(), keys);
    assert_eq!(document.get_array("tags").unwrap().len(), 2);
    assert_eq!(document.get("author"), Some(&Bson::Null));
}

#[tokio::test]
async fn inject_accepts_prefixed_keys_and_ids() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let mut book = Book::default();
    books
        .inject(
            &mut book,
            doc! { "id": "moby-dick", "@title": "Moby Dick", "price": 9.5 },
        )
        .unwrap();

    assert_eq!(book.id, Some(Id::from("moby-dick")));
    assert_eq!(book.title, "Moby Dick");
    assert_eq!(book.price, 9.5);
}

#[tokio::test]
async fn unknown_fields_follow_the_policy() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let book = books
        .deserialize(doc! { "title": "Dune", "publisher": "Chilton" })
        .unwrap();
    assert_eq!(book.title, "Dune");

    let (strict, _) = registry_with(MapperOptions::strict());
    let books = strict.mapper::<Book>().unwrap();
    let result = books.deserialize(doc! { "title": "Dune", "publisher": "Chilton" });
    assert!(matches!(
        result,
        Err(MappingError::UnknownAttribute { attribute, .. }) if attribute == "publisher"
    ));
}

#[tokio::test]
async fn unmapped_values_follow_the_policy() {
    let note = Note {
        body: "script".into(),
        payload: Bson::JavaScriptCode("return 1".into()),
        ..Note::default()
    };

    let (registry, _) = registry();
    let notes = registry.mapper::<Note>().unwrap();
    let document = notes.serialize(&note).unwrap();
    assert!(document.contains_key("body"));
    assert!(!document.contains_key("payload"));

    let (strict, _) = registry_with(MapperOptions::strict());
    let notes = strict.mapper::<Note>().unwrap();
    assert!(matches!(
        notes.serialize(&note),
        Err(MappingError::Unserializable { class: "Memo", .. })
    ));
}

#[tokio::test]
async fn insert_assigns_an_id() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let mut book = Book::titled("Moby Dick", 9.5);
    assert!(!books.persisted(&book));

    let id = books.insert(&mut book).await.unwrap();
    assert!(books.persisted(&book));
    assert_eq!(books.id_for(&book), Some(&id));

    let stored = books.find_uncached(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Moby Dick");
    assert_eq!(stored.price, 9.5);
}

#[tokio::test]
async fn invalid_objects_never_reach_the_store() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let mut book = Book::titled("", 5.0);
    let result = books.insert(&mut book).await;

    assert!(matches!(
        result,
        Err(MappingError::ValidationFailure { class: "Book" })
    ));
    assert!(book.id.is_none());
    assert_eq!(books.count().await.unwrap(), 0);
}

#[tokio::test]
async fn id_rules_choose_the_id() {
    let (registry, _) = registry();
    let publishers = registry.mapper::<Publisher>().unwrap();

    let mut publisher = Publisher {
        name: "Penguin Books".into(),
        ..Publisher::default()
    };
    let id = publishers.insert(&mut publisher).await.unwrap();

    assert_eq!(id, Id::from("penguin-books"));
    assert!(publishers.find(id).await.unwrap().is_some());

    let mut duplicate = Publisher {
        name: "Penguin Books".into(),
        ..Publisher::default()
    };
    assert!(matches!(
        publishers.insert(&mut duplicate).await,
        Err(MappingError::Store(DocumentStoreError::DocumentAlreadyExists(_, _)))
    ));
}

#[tokio::test]
async fn find_returns_the_cached_instance() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let seeded = seed_books(&books, &[("Moby Dick", 9.5)]).await;
    let id = seeded[0].id.clone().unwrap();

    let first = books.find(id.clone()).await.unwrap().unwrap();
    let second = books.find(id.clone()).await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    books
        .update(id.clone(), doc! { "@price": 12.0 })
        .await
        .unwrap();

    let refreshed = books.find(id).await.unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(first.price, 9.5);
    assert_eq!(refreshed.price, 12.0);
}

#[tokio::test]
async fn identity_map_does_not_keep_objects_alive() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let seeded = seed_books(&books, &[("Moby Dick", 9.5)]).await;
    let id = seeded[0].id.clone().unwrap();

    let found = books.find(id.clone()).await.unwrap().unwrap();
    assert!(books.identity_map().get("Book", &id).await.is_some());

    drop(found);
    assert!(books.identity_map().get("Book", &id).await.is_none());
    assert!(books.identity_map().is_empty().await);
}

#[tokio::test]
async fn missing_objects_are_not_found() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    assert!(books.find(Id::new()).await.unwrap().is_none());
    assert!(books.first().await.unwrap().is_none());
}

#[tokio::test]
async fn update_object_can_refresh_memory() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let mut book = seed_books(&books, &[("Moby Dick", 9.5)]).await.remove(0);

    books
        .update_object(&mut book, doc! { "price": 11.0 }, false)
        .await
        .unwrap();
    assert_eq!(book.price, 9.5);

    books
        .update_object(&mut book, doc! { "@price": 13.0 }, true)
        .await
        .unwrap();
    assert_eq!(book.price, 13.0);

    let stored = books.find_uncached(book.id.clone().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.price, 13.0);
}

#[tokio::test]
async fn save_writes_the_whole_object() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let mut book = seed_books(&books, &[("Moby Dick", 9.5)]).await.remove(0);

    book.title = "Moby-Dick; or, The Whale".into();
    book.tags.push("classic".into());
    books.save(&book).await.unwrap();

    let stored = books.find_uncached(book.id.clone().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.title, "Moby-Dick; or, The Whale");
    assert_eq!(stored.tags, vec!["classic".to_string()]);
}

#[tokio::test]
async fn unpersisted_targets_are_rejected() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let book = Book::titled("Moby Dick", 9.5);

    assert!(matches!(
        books.update(&book, doc! { "price": 1.0 }).await,
        Err(MappingError::NotPersisted { class: "Book" })
    ));
    assert!(matches!(
        books.delete(&book).await,
        Err(MappingError::NotPersisted { .. })
    ));
}

#[tokio::test]
async fn delete_removes_objects() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let seeded = seed_books(&books, &[("Moby Dick", 9.5), ("Dune", 12.0), ("Emma", 4.0)]).await;

    let cached = books.find(seeded[0].id.clone().unwrap()).await.unwrap().unwrap();
    books.delete(&seeded[0]).await.unwrap();
    assert!(books.find(cached.id.clone().unwrap()).await.unwrap().is_none());
    assert_eq!(books.count().await.unwrap(), 2);

    books.delete_all().await.unwrap();
    assert_eq!(books.count().await.unwrap(), 0);
    assert!(books.find(seeded[1].id.clone().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn increments_are_applied_in_the_store() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let book = seed_books(&books, &[("Moby Dick", 9.5)]).await.remove(0);

    books.increment(&book, "copies_sold", 5).await.unwrap();
    books.decrement(&book, "copies_sold", 2).await.unwrap();

    let stored = books.find(book.id.clone().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.copies_sold, 3);
}

#[tokio::test]
async fn non_numeric_increments_fail_without_changes() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    let book = seed_books(&books, &[("Moby Dick", 9.5)]).await.remove(0);

    let result = books.increment(&book, "title", 1).await;
    assert!(matches!(
        result,
        Err(MappingError::NonNumericIncrement { attribute, .. }) if attribute == "title"
    ));

    let stored = books.find_uncached(book.id.clone().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.title, "Moby Dick");
}

#[tokio::test]
async fn increments_invalidate_the_cached_instance() {
    let (registry, _) = registry();
    let authors = registry.mapper::<Author>().unwrap();

    let mut author = Author {
        born: Some(1818),
        ..Author::named("Herman Melville")
    };
    let id = authors.insert(&mut author).await.unwrap();

    let cached = authors.find(id.clone()).await.unwrap().unwrap();
    authors.increment(id.clone(), "born", 1).await.unwrap();

    let refreshed = authors.find(id).await.unwrap().unwrap();
    assert!(!Arc::ptr_eq(&cached, &refreshed));
    assert_eq!(refreshed.born, Some(1819));
}

#[tokio::test]
async fn opposite_increments_cancel_out() {
    let (registry, _) = registry();
    let authors = registry.mapper::<Author>().unwrap();

    let mut author = Author {
        born: Some(1775),
        ..Author::named("Jane Austen")
    };
    let id = authors.insert(&mut author).await.unwrap();

    authors.increment(&author, "born", 3).await.unwrap();
    assert_eq!(
        authors.find_uncached(id.clone()).await.unwrap().unwrap().born,
        Some(1778)
    );

    authors.decrement(&author, "born", 3).await.unwrap();
    assert_eq!(authors.find_uncached(id).await.unwrap().unwrap().born, Some(1775));
}
