//! Runs only when `CATALOG_TEST_MONGODB_URI` points at a reachable server.
#![cfg(feature = "mongo")]

use catalog_core::{
    BookSummary, BookUpdate, CatalogStore, MongoCatalogStore, NewBook, RecordId, StoreError,
};
use uuid::Uuid;

const URI_ENV_VAR: &str = "CATALOG_TEST_MONGODB_URI";

struct ScratchDatabase {
    store: MongoCatalogStore,
}

impl ScratchDatabase {
    fn connect() -> Option<Self> {
        let uri = std::env::var(URI_ENV_VAR).ok()?;
        let name = format!("catalog_test_{}", Uuid::new_v4().simple());
        let store = MongoCatalogStore::connect(&uri, &name).unwrap();
        store.create_schema().unwrap();
        Some(Self { store })
    }
}

impl Drop for ScratchDatabase {
    fn drop(&mut self) {
        if let Ok(database) = self.store.database() {
            let _ = database.drop(None);
        }
    }
}

macro_rules! scratch_or_skip {
    () => {
        match ScratchDatabase::connect() {
            Some(scratch) => scratch,
            None => {
                eprintln!("skipping: {URI_ENV_VAR} is not set");
                return;
            }
        }
    };
}

#[test]
fn catalog_walkthrough_matches_sqlite_semantics() {
    let scratch = scratch_or_skip!();
    let store = &scratch.store;

    let authors = store
        .add_authors(&["Gabriel García Márquez", "Isabel Allende"])
        .unwrap();
    let books = store
        .add_books(&[
            NewBook::new("Cien años de soledad", Some(1967), authors[0].clone()),
            NewBook::new("Paula", Some(1994), authors[1].clone()),
            NewBook::new("La casa de los espíritus", Some(1982), authors[1].clone()),
        ])
        .unwrap();

    let listed: Vec<RecordId> = store
        .list_authors()
        .unwrap()
        .into_iter()
        .map(|author| author.id)
        .collect();
    assert_eq!(listed, authors);
    assert_eq!(store.list_books_with_authors().unwrap().len(), 3);
    assert_eq!(
        store.find_books_by_author("Isabel Allende").unwrap(),
        vec![
            BookSummary::new("La casa de los espíritus", Some(1982)),
            BookSummary::new("Paula", Some(1994)),
        ]
    );

    assert!(store
        .update_book(&books[1], &BookUpdate::title("Paula (memorias)"))
        .unwrap());
    let updated = store.get_book(&books[1]).unwrap().unwrap();
    assert_eq!(updated.title, "Paula (memorias)");
    assert_eq!(updated.year, Some(1994));

    assert!(store.delete_book(&books[0]).unwrap());
    assert!(!store.delete_book(&books[0]).unwrap());
    assert!(!store.delete_book(&RecordId::new("not-an-object-id")).unwrap());

    assert!(matches!(
        store.delete_author(&authors[1]),
        Err(StoreError::AuthorHasBooks { books: 2, .. })
    ));
    assert!(store.delete_author(&authors[0]).unwrap());
}

#[test]
fn dangling_books_are_excluded_from_join() {
    let scratch = scratch_or_skip!();
    let store = &scratch.store;

    let author = store.add_author("Jorge Luis Borges").unwrap();
    store
        .add_book(&NewBook::new("Ficciones", Some(1944), author))
        .unwrap();
    store
        .add_book(&NewBook::new(
            "Sin autor",
            None,
            "65f0c0ffee0000000000beef",
        ))
        .unwrap();

    let rows = store.list_books_with_authors().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].author_name, "Jorge Luis Borges");
}

#[test]
fn grouped_insert_persists_author_and_books() {
    let scratch = scratch_or_skip!();
    let store = &scratch.store;

    assert!(store
        .grouped_insert(
            "J.R.R. Tolkien",
            &[("El hobbit", Some(1937)), ("El Señor de los Anillos", Some(1954))],
        )
        .unwrap());

    assert_eq!(store.list_authors().unwrap().len(), 1);
    assert_eq!(
        store.find_books_by_author("J.R.R. Tolkien").unwrap(),
        vec![
            BookSummary::new("El hobbit", Some(1937)),
            BookSummary::new("El Señor de los Anillos", Some(1954)),
        ]
    );
}

#[test]
fn closed_store_reports_closed() {
    let mut scratch = scratch_or_skip!();

    let name = scratch.store.database_name().to_string();
    assert_eq!(scratch.store.database().unwrap().name(), name);
    assert!(name.starts_with("catalog_test_"));
    scratch.store.close().unwrap();
    scratch.store.close().unwrap();
    assert_eq!(scratch.store.database_name(), name);
    assert!(matches!(
        scratch.store.list_authors(),
        Err(StoreError::Closed)
    ));

    let uri = std::env::var(URI_ENV_VAR).unwrap();
    let cleanup = MongoCatalogStore::connect(&uri, &name).unwrap();
    cleanup.database().unwrap().drop(None).unwrap();
}
