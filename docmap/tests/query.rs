mod common;

use docmap::prelude::*;
use futures::TryStreamExt;
use std::collections::HashSet;

use common::{Book, registry, seed_books};

const SHELF: &[(&str, f64)] = &[
    ("Moby Dick", 9.5),
    ("Dune", 12.0),
    ("Emma", 4.0),
    ("Middlemarch", 15.5),
    ("Mobile Homes", 20.0),
];

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().map(|book| book.title.as_str()).collect()
}

#[tokio::test]
async fn select_and_reject_partition_the_collection() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    let predicate = |b: &QueryAttributes| b.attribute("price").lt(10.0) | b.attribute("title").eq("Dune");
    let selected = books.select(predicate).to_vec().await.unwrap();
    let rejected = books.reject(predicate).to_vec().await.unwrap();

    assert_eq!(titles(&selected), vec!["Moby Dick", "Dune", "Emma"]);
    assert_eq!(titles(&rejected), vec!["Middlemarch", "Mobile Homes"]);

    let selected_ids = selected.iter().map(|b| b.id.clone()).collect::<HashSet<_>>();
    assert!(rejected.iter().all(|b| !selected_ids.contains(&b.id)));
    assert_eq!(
        (selected.len() + rejected.len()) as u64,
        books.count().await.unwrap()
    );
}

#[tokio::test]
async fn predicates_combine() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    let between = books
        .select(|b| b.attribute("price").gte(9.5) & b.attribute("price").lte(15.5))
        .to_vec()
        .await
        .unwrap();
    assert_eq!(titles(&between), vec!["Moby Dick", "Dune", "Middlemarch"]);

    let not_dune = books
        .select(|b| !b.attribute("title").eq("Dune") & b.attribute("price").gt(10.0))
        .count()
        .await
        .unwrap();
    assert_eq!(not_dune, 2);

    let others = books
        .select(|b| b.attribute("title").ne("Emma"))
        .count()
        .await
        .unwrap();
    assert_eq!(others, 4);
}

#[tokio::test]
async fn patterns_match_titles() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    let found = books
        .select(|b| b.attribute("title").matches("^Mob"))
        .to_vec()
        .await
        .unwrap();
    assert_eq!(titles(&found), vec!["Moby Dick", "Mobile Homes"]);

    let result = books
        .select(|b| b.attribute("title").matches("(unclosed"))
        .to_vec()
        .await;
    assert!(matches!(
        result,
        Err(MappingError::Store(DocumentStoreError::InvalidQuery(_)))
    ));
}

#[tokio::test]
async fn counting_predicates() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    assert_eq!(books.count().await.unwrap(), 5);
    assert_eq!(
        books.count_where(|b| b.attribute("price").gt(10.0)).await.unwrap(),
        3
    );

    assert!(books.any_where(|b| b.attribute("title").eq("Emma")).await.unwrap());
    assert!(!books.any_where(|b| b.attribute("title").eq("Ulysses")).await.unwrap());

    assert!(books.all_where(|b| b.attribute("price").gt(1.0)).await.unwrap());
    assert!(!books.all_where(|b| b.attribute("price").gt(5.0)).await.unwrap());

    assert!(books.one_where(|b| b.attribute("title").eq("Dune")).await.unwrap());
    assert!(!books.one_where(|b| b.attribute("price").gt(10.0)).await.unwrap());

    assert!(books.none_where(|b| b.attribute("price").gt(100.0)).await.unwrap());
    assert!(!books.none_where(|b| b.attribute("price").lt(5.0)).await.unwrap());
}

#[tokio::test]
async fn counting_predicates_on_an_empty_collection() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    assert!(!books.any_where(|b| b.attribute("price").gt(0.0)).await.unwrap());
    assert!(books.all_where(|b| b.attribute("price").gt(0.0)).await.unwrap());
    assert!(books.none_where(|b| b.attribute("price").gt(0.0)).await.unwrap());
}

#[tokio::test]
async fn retrievals_sort_and_paginate() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    let page = books
        .all()
        .sort("price", SortDirection::Desc)
        .offset(1)
        .limit(2);

    assert_eq!(titles(&page.to_vec().await.unwrap()), vec!["Middlemarch", "Dune"]);
    assert_eq!(page.first().await.unwrap().unwrap().title, "Middlemarch");
    assert_eq!(page.count().await.unwrap(), 5);
}

#[tokio::test]
async fn retrievals_are_lazy_and_repeatable() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let cheap = books.select(|b| b.attribute("price").lt(10.0));
    assert!(cheap.to_vec().await.unwrap().is_empty());

    seed_books(&books, SHELF).await;

    let streamed = cheap.stream().try_collect::<Vec<_>>().await.unwrap();
    assert_eq!(titles(&streamed), vec!["Moby Dick", "Emma"]);
    assert_eq!(titles(&cheap.to_vec().await.unwrap()), vec!["Moby Dick", "Emma"]);
}

#[tokio::test]
async fn find_by_and_first() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    assert_eq!(books.first().await.unwrap().unwrap().title, "Moby Dick");

    let emma = books
        .find_by(|b| b.attribute("title").eq("Emma"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(emma.price, 4.0);

    let by_id = books
        .find_by(|b| b.id().eq(emma.id.clone().unwrap()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.title, "Emma");
}

#[tokio::test]
async fn first_respects_the_retrieval_window() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    seed_books(&books, SHELF).await;

    let empty = books.all().limit(0);
    assert!(empty.to_vec().await.unwrap().is_empty());
    assert!(empty.first().await.unwrap().is_none());

    let window = books.all().offset(2).limit(3);
    assert_eq!(window.first().await.unwrap().unwrap().title, "Emma");

    let past_the_end = books.all().offset(5);
    assert!(past_the_end.first().await.unwrap().is_none());
}

#[tokio::test]
async fn sample_picks_a_stored_object() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    assert!(books.sample().await.unwrap().is_none());

    seed_books(&books, SHELF).await;
    let shelf = SHELF.iter().map(|(title, _)| *title).collect::<HashSet<_>>();
    for _ in 0..10 {
        let picked = books.sample().await.unwrap().unwrap();
        assert!(shelf.contains(picked.title.as_str()));
    }
}
