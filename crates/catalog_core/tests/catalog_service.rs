use catalog_core::{
    BookSummary, BookUpdate, CatalogService, CatalogStore, NewBook, RecordId,
    SqliteCatalogStore, StoreConfig, StoreError,
};

fn service() -> CatalogService<SqliteCatalogStore> {
    CatalogService::new(SqliteCatalogStore::open_in_memory().unwrap())
}

#[test]
fn demo_walkthrough_produces_expected_catalog() {
    let service = service();

    let report = service.run_demo().unwrap();

    assert_eq!(report.author_ids.len(), 3);
    assert_eq!(report.book_ids.len(), 6);
    assert_eq!(report.initial_listing.len(), 6);
    assert_eq!(report.lookup_author, "Gabriel García Márquez");
    assert_eq!(
        report.lookup,
        vec![
            BookSummary::new("Cien años de soledad", Some(1967)),
            BookSummary::new("El amor en los tiempos del cólera", Some(1985)),
        ]
    );
    assert!(report.updated);
    assert_eq!(
        report.after_update[0].title,
        "Cien años de soledad (Edición especial)"
    );
    assert!(report.deleted);
    assert_eq!(report.after_delete.len(), 5);
    assert!(report
        .after_delete
        .iter()
        .all(|row| row.title != "El Aleph"));
    assert!(report.grouped_insert);
    let names: Vec<&str> = report.authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Gabriel García Márquez",
            "Isabel Allende",
            "Jorge Luis Borges",
            "J.R.R. Tolkien"
        ]
    );
    assert_eq!(service.list_books_with_authors().unwrap().len(), 7);
}

#[test]
fn author_with_books_collects_referencing_books() {
    let service = service();
    let author = service.add_author("Isabel Allende").unwrap();
    let other = service.add_author("Julio Cortázar").unwrap();
    service
        .add_books(&[
            NewBook::new("Paula", Some(1994), author.clone()),
            NewBook::new("Rayuela", Some(1963), other),
            NewBook::new("Eva Luna", Some(1987), author.clone()),
        ])
        .unwrap();

    let detail = service.author_with_books(&author).unwrap().unwrap();

    assert_eq!(detail.author.name, "Isabel Allende");
    let titles: Vec<&str> = detail.books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Paula", "Eva Luna"]);
    assert!(service
        .author_with_books(&RecordId::from(77))
        .unwrap()
        .is_none());
}

#[test]
fn add_book_checked_requires_existing_author() {
    let service = service();
    let author = service.add_author("Pablo Neruda").unwrap();

    let stored = service
        .add_book_checked(&NewBook::new("Canto general", Some(1950), author.clone()))
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Canto general");
    assert_eq!(stored.author_id, author);

    let rejected = service
        .add_book_checked(&NewBook::new("Huérfano", None, 404))
        .unwrap();
    assert!(rejected.is_none());
    assert_eq!(service.list_books().unwrap().len(), 1);

    assert!(matches!(
        service.add_book_checked(&NewBook::new("", None, author)),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn update_book_returning_yields_stored_state() {
    let service = service();
    let author = service.add_author("Octavio Paz").unwrap();
    let id = service
        .add_book(&NewBook::new("Piedra de sol", Some(1956), author))
        .unwrap();

    let book = service
        .update_book_returning(&id, &BookUpdate::year(1957))
        .unwrap()
        .unwrap();
    assert_eq!(book.title, "Piedra de sol");
    assert_eq!(book.year, Some(1957));

    assert!(service
        .update_book_returning(&RecordId::from(999), &BookUpdate::year(1))
        .unwrap()
        .is_none());
}

#[test]
fn service_over_boxed_store_from_config() {
    let store = StoreConfig::parse("sqlite::memory:").unwrap().open().unwrap();
    let mut service = CatalogService::new(store);

    assert!(service
        .grouped_insert("Juan Rulfo", &[("Pedro Páramo", Some(1955))])
        .unwrap());
    assert_eq!(service.store().backend(), "sqlite");

    service.close().unwrap();
    assert!(!service.store().is_open());
    assert!(matches!(service.list_authors(), Err(StoreError::Closed)));
}
