//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide stable catalog entry points for CLI and HTTP callers.
//! - Compose store calls into use-case reads (author detail, checked inserts).
//! - Own the store handle lifecycle once constructed.
//!
//! # Invariants
//! - Service APIs never bypass store validation/persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::model::author::{Author, AuthorBooks};
use crate::model::book::{Book, BookSummary, BookUpdate, BookWithAuthor, NewBook};
use crate::model::record_id::RecordId;
use crate::store::catalog_store::{CatalogStore, StoreResult};
use log::{debug, info};
use serde::Serialize;

const DEMO_AUTHORS: [&str; 3] = [
    "Gabriel García Márquez",
    "Isabel Allende",
    "Jorge Luis Borges",
];

/// Outcome of the walkthrough run by `CatalogService::run_demo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub author_ids: Vec<RecordId>,
    pub book_ids: Vec<RecordId>,
    pub initial_listing: Vec<BookWithAuthor>,
    pub lookup_author: String,
    pub lookup: Vec<BookSummary>,
    pub updated: bool,
    pub after_update: Vec<BookWithAuthor>,
    pub deleted: bool,
    pub after_delete: Vec<BookWithAuthor>,
    pub grouped_insert: bool,
    pub authors: Vec<Author>,
}

/// Use-case service wrapper for catalog operations.
pub struct CatalogService<S: CatalogStore> {
    store: S,
}

impl<S: CatalogStore> CatalogService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn create_schema(&self) -> StoreResult<()> {
        self.store.create_schema()
    }

    pub fn add_author(&self, name: &str) -> StoreResult<RecordId> {
        self.store.add_author(name)
    }

    pub fn add_authors(&self, names: &[&str]) -> StoreResult<Vec<RecordId>> {
        self.store.add_authors(names)
    }

    pub fn add_book(&self, book: &NewBook) -> StoreResult<RecordId> {
        self.store.add_book(book)
    }

    pub fn add_books(&self, books: &[NewBook]) -> StoreResult<Vec<RecordId>> {
        self.store.add_books(books)
    }

    pub fn list_authors(&self) -> StoreResult<Vec<Author>> {
        self.store.list_authors()
    }

    pub fn get_author(&self, id: &RecordId) -> StoreResult<Option<Author>> {
        self.store.get_author(id)
    }

    pub fn list_books(&self) -> StoreResult<Vec<Book>> {
        self.store.list_books()
    }

    pub fn get_book(&self, id: &RecordId) -> StoreResult<Option<Book>> {
        self.store.get_book(id)
    }

    pub fn list_books_with_authors(&self) -> StoreResult<Vec<BookWithAuthor>> {
        self.store.list_books_with_authors()
    }

    pub fn find_books_by_author(&self, author_name: &str) -> StoreResult<Vec<BookSummary>> {
        self.store.find_books_by_author(author_name)
    }

    pub fn update_book(&self, id: &RecordId, update: &BookUpdate) -> StoreResult<bool> {
        self.store.update_book(id, update)
    }

    pub fn delete_book(&self, id: &RecordId) -> StoreResult<bool> {
        self.store.delete_book(id)
    }

    pub fn delete_author(&self, id: &RecordId) -> StoreResult<bool> {
        self.store.delete_author(id)
    }

    pub fn grouped_insert(
        &self,
        author_name: &str,
        books: &[(&str, Option<i32>)],
    ) -> StoreResult<bool> {
        self.store.grouped_insert(author_name, books)
    }

    /// Loads one author together with the books that reference it.
    pub fn author_with_books(&self, id: &RecordId) -> StoreResult<Option<AuthorBooks>> {
        let Some(author) = self.store.get_author(id)? else {
            return Ok(None);
        };
        let books = self.store.books_by_author_id(&author.id)?;
        Ok(Some(AuthorBooks { author, books }))
    }

    /// Inserts a book only when its author exists.
    ///
    /// # Contract
    /// - Returns `None` without writing when the author does not resolve.
    /// - Returns the stored book otherwise.
    pub fn add_book_checked(&self, book: &NewBook) -> StoreResult<Option<Book>> {
        book.validate()?;
        if self.store.get_author(&book.author_id)?.is_none() {
            debug!(
                "event=book_create module=service status=rejected reason=author_not_found author_id={}",
                book.author_id
            );
            return Ok(None);
        }

        let id = self.store.add_book(book)?;
        self.store.get_book(&id)
    }

    /// Applies a partial update and returns the stored book.
    ///
    /// Returns `None` when the book does not exist.
    pub fn update_book_returning(
        &self,
        id: &RecordId,
        update: &BookUpdate,
    ) -> StoreResult<Option<Book>> {
        if !self.store.update_book(id, update)? {
            return Ok(None);
        }
        self.store.get_book(id)
    }

    /// Runs the catalog walkthrough: seed, list, look up, update, delete,
    /// grouped insert.
    pub fn run_demo(&self) -> StoreResult<DemoReport> {
        let author_ids = self.store.add_authors(&DEMO_AUTHORS)?;
        let seed = [
            ("Cien años de soledad", 1967, 0),
            ("El amor en los tiempos del cólera", 1985, 0),
            ("La casa de los espíritus", 1982, 1),
            ("Paula", 1994, 1),
            ("Ficciones", 1944, 2),
            ("El Aleph", 1949, 2),
        ];
        let books: Vec<NewBook> = seed
            .iter()
            .map(|(title, year, author)| {
                NewBook::new(*title, Some(*year), author_ids[*author].clone())
            })
            .collect();
        let book_ids = self.store.add_books(&books)?;
        let initial_listing = self.store.list_books_with_authors()?;

        let lookup_author = DEMO_AUTHORS[0].to_string();
        let lookup = self.store.find_books_by_author(&lookup_author)?;

        let updated = self.store.update_book(
            &book_ids[0],
            &BookUpdate::title("Cien años de soledad (Edición especial)"),
        )?;
        let after_update = self.store.list_books_with_authors()?;

        let deleted = self.store.delete_book(&book_ids[5])?;
        let after_delete = self.store.list_books_with_authors()?;

        let grouped_insert = self.store.grouped_insert(
            "J.R.R. Tolkien",
            &[("El hobbit", Some(1937)), ("El Señor de los Anillos", Some(1954))],
        )?;
        let authors = self.store.list_authors()?;

        info!(
            "event=demo_run module=service status=ok backend={} authors={} updated={} deleted={} grouped_insert={}",
            self.store.backend(),
            authors.len(),
            updated,
            deleted,
            grouped_insert
        );

        Ok(DemoReport {
            author_ids,
            book_ids,
            initial_listing,
            lookup_author,
            lookup,
            updated,
            after_update,
            deleted,
            after_delete,
            grouped_insert,
            authors,
        })
    }

    /// Releases the store handle.
    pub fn close(&mut self) -> StoreResult<()> {
        self.store.close()
    }
}
