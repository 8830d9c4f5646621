//! Store interface shared by the SQLite and MongoDB backends.

use crate::db::DbError;
use crate::model::author::Author;
use crate::model::book::{Book, BookSummary, BookUpdate, BookWithAuthor, NewBook};
use crate::model::record_id::RecordId;
use crate::model::ModelValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by catalog store operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(ModelValidationError),
    Db(DbError),
    #[cfg(feature = "mongo")]
    Mongo(mongodb::error::Error),
    AuthorHasBooks {
        author_id: RecordId,
        books: u64,
    },
    InvalidData(String),
    Closed,
}

impl StoreError {
    /// Returns whether the backing store itself could not be reached.
    ///
    /// These are the only failures grouped inserts propagate instead of
    /// reporting `false`.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Db(DbError::Io(_)) => true,
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))) => matches!(
                err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseCorrupt
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::DiskFull
            ),
            #[cfg(feature = "mongo")]
            Self::Mongo(err) => matches!(
                *err.kind,
                mongodb::error::ErrorKind::ServerSelection { .. }
                    | mongodb::error::ErrorKind::Io(_)
                    | mongodb::error::ErrorKind::ConnectionPoolCleared { .. }
            ),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            #[cfg(feature = "mongo")]
            Self::Mongo(err) => write!(f, "{err}"),
            Self::AuthorHasBooks { author_id, books } => write!(
                f,
                "author {author_id} is still referenced by {books} book(s)"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored catalog data: {message}"),
            Self::Closed => write!(f, "catalog store is closed"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            #[cfg(feature = "mongo")]
            Self::Mongo(err) => Some(err),
            Self::AuthorHasBooks { .. } | Self::InvalidData(_) | Self::Closed => None,
        }
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for StoreError {
    fn from(value: mongodb::error::Error) -> Self {
        Self::Mongo(value)
    }
}

/// Author/book persistence contract.
///
/// Ids passed in are opaque; an id the backend cannot interpret behaves like
/// an id that does not exist.
pub trait CatalogStore {
    /// Short backend name used in log events.
    fn backend(&self) -> &'static str;

    /// Ensures author and book containers exist. Safe to call repeatedly.
    fn create_schema(&self) -> StoreResult<()>;

    /// Inserts one author per name and returns ids in insertion order.
    fn add_authors(&self, names: &[&str]) -> StoreResult<Vec<RecordId>>;

    /// Inserts books without checking that their authors exist.
    fn add_books(&self, books: &[NewBook]) -> StoreResult<Vec<RecordId>>;

    fn add_author(&self, name: &str) -> StoreResult<RecordId> {
        self.add_authors(&[name])?
            .pop()
            .ok_or_else(|| StoreError::InvalidData("insert returned no author id".to_string()))
    }

    fn add_book(&self, book: &NewBook) -> StoreResult<RecordId> {
        self.add_books(std::slice::from_ref(book))?
            .pop()
            .ok_or_else(|| StoreError::InvalidData("insert returned no book id".to_string()))
    }

    /// Lists authors in insertion order.
    fn list_authors(&self) -> StoreResult<Vec<Author>>;

    fn get_author(&self, id: &RecordId) -> StoreResult<Option<Author>>;

    /// Lists books in insertion order.
    fn list_books(&self) -> StoreResult<Vec<Book>>;

    fn get_book(&self, id: &RecordId) -> StoreResult<Option<Book>>;

    /// Lists books whose `author_id` equals `author_id`.
    fn books_by_author_id(&self, author_id: &RecordId) -> StoreResult<Vec<Book>>;

    /// Joins books with their authors. Dangling references are excluded.
    fn list_books_with_authors(&self) -> StoreResult<Vec<BookWithAuthor>>;

    /// Exact-match lookup on author name.
    fn find_books_by_author(&self, author_name: &str) -> StoreResult<Vec<BookSummary>>;

    /// Applies the supplied fields and reports whether the book exists.
    fn update_book(&self, id: &RecordId, update: &BookUpdate) -> StoreResult<bool>;

    /// Removes the book and reports whether one was removed.
    fn delete_book(&self, id: &RecordId) -> StoreResult<bool>;

    /// Removes an author that no book references.
    ///
    /// # Errors
    /// - `StoreError::AuthorHasBooks` while books still reference the author.
    fn delete_author(&self, id: &RecordId) -> StoreResult<bool>;

    /// Inserts one author plus its books as a unit.
    ///
    /// Step failures undo earlier steps and return `Ok(false)`; only
    /// validation errors and an unavailable store are returned as `Err`.
    fn grouped_insert(&self, author_name: &str, books: &[(&str, Option<i32>)])
        -> StoreResult<bool>;

    /// Releases the underlying handle. Idempotent.
    fn close(&mut self) -> StoreResult<()>;

    fn is_open(&self) -> bool;
}

impl<S: CatalogStore + ?Sized> CatalogStore for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn create_schema(&self) -> StoreResult<()> {
        (**self).create_schema()
    }

    fn add_authors(&self, names: &[&str]) -> StoreResult<Vec<RecordId>> {
        (**self).add_authors(names)
    }

    fn add_books(&self, books: &[NewBook]) -> StoreResult<Vec<RecordId>> {
        (**self).add_books(books)
    }

    fn add_author(&self, name: &str) -> StoreResult<RecordId> {
        (**self).add_author(name)
    }

    fn add_book(&self, book: &NewBook) -> StoreResult<RecordId> {
        (**self).add_book(book)
    }

    fn list_authors(&self) -> StoreResult<Vec<Author>> {
        (**self).list_authors()
    }

    fn get_author(&self, id: &RecordId) -> StoreResult<Option<Author>> {
        (**self).get_author(id)
    }

    fn list_books(&self) -> StoreResult<Vec<Book>> {
        (**self).list_books()
    }

    fn get_book(&self, id: &RecordId) -> StoreResult<Option<Book>> {
        (**self).get_book(id)
    }

    fn books_by_author_id(&self, author_id: &RecordId) -> StoreResult<Vec<Book>> {
        (**self).books_by_author_id(author_id)
    }

    fn list_books_with_authors(&self) -> StoreResult<Vec<BookWithAuthor>> {
        (**self).list_books_with_authors()
    }

    fn find_books_by_author(&self, author_name: &str) -> StoreResult<Vec<BookSummary>> {
        (**self).find_books_by_author(author_name)
    }

    fn update_book(&self, id: &RecordId, update: &BookUpdate) -> StoreResult<bool> {
        (**self).update_book(id, update)
    }

    fn delete_book(&self, id: &RecordId) -> StoreResult<bool> {
        (**self).delete_book(id)
    }

    fn delete_author(&self, id: &RecordId) -> StoreResult<bool> {
        (**self).delete_author(id)
    }

    fn grouped_insert(
        &self,
        author_name: &str,
        books: &[(&str, Option<i32>)],
    ) -> StoreResult<bool> {
        (**self).grouped_insert(author_name, books)
    }

    fn close(&mut self) -> StoreResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Validates grouped-insert input before any store mutation.
pub(crate) fn validate_grouped_insert(
    author_name: &str,
    books: &[(&str, Option<i32>)],
) -> Result<(), ModelValidationError> {
    crate::model::validate_author_name(author_name)?;
    if books.is_empty() {
        return Err(ModelValidationError::EmptyBookBatch);
    }
    for (title, _) in books {
        crate::model::validate_book_title(title)?;
    }
    Ok(())
}

/// Outcome of a failed grouped-insert step once earlier steps are undone.
pub(crate) fn grouped_insert_failure(err: StoreError) -> StoreResult<bool> {
    if err.is_unavailable() {
        Err(err)
    } else {
        Ok(false)
    }
}
