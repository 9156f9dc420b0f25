mod common;

use docmap::{memory::InMemoryStore, prelude::*};

use common::{Author, Book, Publisher, registry};

#[tokio::test]
async fn lookups_by_class_name() {
    let (registry, _) = registry();

    assert!(registry.has("Book"));
    assert!(registry.has("Memo"));
    assert!(!registry.has("Note"));

    let mapper = registry.lookup("Publisher").unwrap();
    assert_eq!(mapper.collection(), "publishers");
    assert_eq!(
        registry.classes().collect::<Vec<_>>(),
        vec!["Author", "Book", "Address", "Publisher", "Memo"]
    );

    assert!(matches!(
        registry.lookup("Magazine"),
        Err(MappingError::NotRegistered(class)) if class == "Magazine"
    ));
}

#[tokio::test]
async fn unregistered_classes_have_no_mapper() {
    let mut builder = MapperRegistry::builder(InMemoryStore::new());
    builder.register::<Author>().unwrap();
    let registry = builder.build();

    assert!(matches!(
        registry.mapper::<Publisher>(),
        Err(MappingError::NotRegistered(_))
    ));
}

#[tokio::test]
async fn registering_again_replaces_the_mapper() {
    let mut builder = MapperRegistry::builder(InMemoryStore::new());
    builder
        .register::<Book>()
        .unwrap()
        .register_with::<Book, _>(|definition| {
            Ok(definition
                .collection("archived_books")
                .validate(|book: &Book| book.price > 0.0))
        })
        .unwrap();
    let registry = builder.build();

    assert_eq!(registry.classes().collect::<Vec<_>>(), vec!["Book"]);

    let books = registry.mapper::<Book>().unwrap();
    assert_eq!(books.collection(), "archived_books");

    let mut free = Book::titled("Free Book", 0.0);
    assert!(matches!(
        books.insert(&mut free).await,
        Err(MappingError::ValidationFailure { .. })
    ));

    let mut priced = Book::titled("", 3.0);
    books.insert(&mut priced).await.unwrap();
    assert_eq!(
        registry.backend().count_documents("archived_books", None).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn definitions_can_be_extended() {
    let mut builder = MapperRegistry::builder(InMemoryStore::new());
    builder
        .register_with::<Author, _>(|definition| {
            definition.attribute("born_year", |a: &Author| &a.born, |a: &mut Author| &mut a.born)
        })
        .unwrap();
    let registry = builder.build();

    let authors = registry.mapper::<Author>().unwrap();
    assert_eq!(authors.attributes(), vec!["name", "born", "born_year"]);
}

#[tokio::test]
async fn invalid_attribute_declarations_fail_registration() {
    let mut builder = MapperRegistry::builder(InMemoryStore::new());

    let duplicate = builder.register_with::<Author, _>(|definition| {
        definition.attribute("name", |a: &Author| &a.name, |a: &mut Author| &mut a.name)
    });
    assert!(matches!(
        duplicate,
        Err(MappingError::DuplicateAttribute { class: "Author", .. })
    ));

    let reserved = builder.register_with::<Author, _>(|definition| {
        definition.attribute("id", |a: &Author| &a.name, |a: &mut Author| &mut a.name)
    });
    assert!(matches!(reserved, Err(MappingError::InvalidAttribute { .. })));

    let dotted = builder.register_with::<Author, _>(|definition| {
        definition.attribute("pen.name", |a: &Author| &a.name, |a: &mut Author| &mut a.name)
    });
    assert!(matches!(dotted, Err(MappingError::InvalidAttribute { .. })));

    assert!(!builder.build().has("Author"));
}

#[tokio::test]
async fn mappers_outliving_the_registry_report_it() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();
    drop(registry);

    assert!(matches!(
        books.serialize(&Book::titled("Orphan", 1.0)),
        Err(MappingError::RegistryUnavailable)
    ));
}

#[tokio::test]
async fn options_load_from_configuration() {
    let options: MapperOptions =
        serde_json::from_str(r#"{ "unknown_attributes": "reject" }"#).unwrap();
    assert_eq!(options.unknown_attributes, UnknownAttributePolicy::Reject);
    assert_eq!(options.unmapped_values, UnmappedValuePolicy::Omit);

    let mut builder = MapperRegistry::builder(InMemoryStore::new());
    builder.options(options).register::<Book>().unwrap();
    let registry = builder.build();

    assert_eq!(registry.options(), options);
}

#[tokio::test]
async fn indexed_attributes_are_declared() {
    let (registry, _) = registry();
    registry.declare_indexes().await.unwrap();

    let authors = registry.mapper::<Author>().unwrap();
    let declared = authors.indexes().await.unwrap();
    assert_eq!(declared.len(), 1);
    assert_eq!(declared[0].name(), "name_1");
    assert!(authors.active_indexes().await.unwrap().is_empty());

    authors.reindex().await.unwrap();
    assert_eq!(authors.active_indexes().await.unwrap(), declared);
}

#[tokio::test]
async fn indexes_are_managed_per_mapper() {
    let (registry, _) = registry();
    let books = registry.mapper::<Book>().unwrap();

    let price = books
        .index("price", IndexOptions::unique().with_order(IndexOrder::Descending))
        .await
        .unwrap();
    assert_eq!(price.name(), "price_-1");
    assert!(price.unique);

    assert!(matches!(
        books.index("isbn", IndexOptions::default()).await,
        Err(MappingError::UnknownAttribute { attribute, .. }) if attribute == "isbn"
    ));

    books.reindex().await.unwrap();
    assert_eq!(books.active_indexes().await.unwrap(), vec![price.clone()]);

    books.remove_index(&price).await.unwrap();
    assert!(books.indexes().await.unwrap().is_empty());

    books.index("title", IndexOptions::default()).await.unwrap();
    books.reindex().await.unwrap();
    let active = books.active_indexes().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].attribute, "title");
}
