//! MongoDB-backed catalog store.
//!
//! # Responsibility
//! - Provide the catalog operations over the `authors` and `libros`
//!   collections.
//! - Emulate grouped-insert atomicity with compensating deletes.
//!
//! # Invariants
//! - Documents use the wire field names `nombre`, `titulo`, `anio`,
//!   `autor_id`.
//! - Ids are generated client-side so insertion order is known without
//!   reading back server results. `_id` order matches insertion order for
//!   writes from one process; across processes it holds to the second.
//! - `autor_id` references are stored unchecked.

use super::catalog_store::{
    grouped_insert_failure, validate_grouped_insert, CatalogStore, StoreError, StoreResult,
};
use crate::model::author::Author;
use crate::model::book::{Book, BookSummary, BookUpdate, BookWithAuthor, NewBook};
use crate::model::record_id::RecordId;
use crate::model::{validate_author_name, ModelValidationError};
use log::{error, info, warn};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::sync::{Client, Collection, Database};
use mongodb::IndexModel;
use std::time::Instant;

/// Database name used when a connection string does not choose one.
pub const DEFAULT_DATABASE: &str = "biblioteca";

const AUTHORS_COLLECTION: &str = "authors";
const BOOKS_COLLECTION: &str = "libros";

struct MongoHandle {
    _client: Client,
    db: Database,
}

/// Catalog store over one MongoDB database.
pub struct MongoCatalogStore {
    handle: Option<MongoHandle>,
    database_name: String,
}

impl MongoCatalogStore {
    /// Connects and pings the server so an unreachable store fails here.
    ///
    /// # Side effects
    /// - Emits `store_open` logging events with duration and status.
    pub fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=store backend=mongo status=start database={database}");

        let result = Client::with_uri_str(uri).and_then(|client| {
            let db = client.database(database);
            db.run_command(doc! { "ping": 1 }, None)?;
            Ok(MongoHandle {
                _client: client,
                db,
            })
        });

        match result {
            Ok(handle) => {
                info!(
                    "event=store_open module=store backend=mongo status=ok database={database} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    handle: Some(handle),
                    database_name: database.to_string(),
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store backend=mongo status=error database={database} duration_ms={} error_code=store_unavailable error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Name of the database this store was opened on; still set after `close`.
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Borrows the open database handle.
    pub fn database(&self) -> StoreResult<&Database> {
        self.handle
            .as_ref()
            .map(|handle| &handle.db)
            .ok_or(StoreError::Closed)
    }

    fn authors(&self) -> StoreResult<Collection<Document>> {
        Ok(self.database()?.collection(AUTHORS_COLLECTION))
    }

    fn books(&self) -> StoreResult<Collection<Document>> {
        Ok(self.database()?.collection(BOOKS_COLLECTION))
    }

    fn find_books(&self, filter: Option<Document>, sort: Document) -> StoreResult<Vec<Book>> {
        let options = FindOptions::builder().sort(sort).build();
        let mut books = Vec::new();
        for document in self.books()?.find(filter, options)? {
            books.push(parse_book(&document?)?);
        }
        Ok(books)
    }
}

/// Sort on `_id`, the client-generated ObjectId.
///
/// ObjectIds created by one process increase with every call. Across
/// processes only the leading timestamp compares, at one-second resolution,
/// so records written by separate runs within the same second may list out
/// of insertion order.
fn insertion_order() -> Document {
    doc! { "_id": 1 }
}

impl CatalogStore for MongoCatalogStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    fn create_schema(&self) -> StoreResult<()> {
        let authors = self.authors()?;
        authors.create_index(ascending_index("nombre"), None)?;

        let books = self.books()?;
        for field in ["titulo", "anio", "autor_id"] {
            books.create_index(ascending_index(field), None)?;
        }
        Ok(())
    }

    fn add_authors(&self, names: &[&str]) -> StoreResult<Vec<RecordId>> {
        for name in names {
            validate_author_name(name)?;
        }
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ObjectId> = names.iter().map(|_| ObjectId::new()).collect();
        let documents = ids
            .iter()
            .zip(names)
            .map(|(id, name)| author_document(*id, name));
        self.authors()?.insert_many(documents, None)?;

        Ok(ids.iter().map(record_id).collect())
    }

    fn add_books(&self, books: &[NewBook]) -> StoreResult<Vec<RecordId>> {
        let mut documents = Vec::with_capacity(books.len());
        let mut ids = Vec::with_capacity(books.len());
        for book in books {
            book.validate()?;
            let author_id = parse_object_id(&book.author_id)
                .ok_or(ModelValidationError::MalformedAuthorId)?;
            let id = ObjectId::new();
            documents.push(book_document(id, &book.title, book.year, author_id));
            ids.push(record_id(&id));
        }
        if documents.is_empty() {
            return Ok(ids);
        }

        self.books()?.insert_many(documents, None)?;
        Ok(ids)
    }

    fn list_authors(&self) -> StoreResult<Vec<Author>> {
        let options = FindOptions::builder().sort(insertion_order()).build();
        let mut authors = Vec::new();
        for document in self.authors()?.find(None, options)? {
            authors.push(parse_author(&document?)?);
        }
        Ok(authors)
    }

    fn get_author(&self, id: &RecordId) -> StoreResult<Option<Author>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };

        self.authors()?
            .find_one(doc! { "_id": oid }, None)?
            .map(|document| parse_author(&document))
            .transpose()
    }

    fn list_books(&self) -> StoreResult<Vec<Book>> {
        self.find_books(None, insertion_order())
    }

    fn get_book(&self, id: &RecordId) -> StoreResult<Option<Book>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };

        self.books()?
            .find_one(doc! { "_id": oid }, None)?
            .map(|document| parse_book(&document))
            .transpose()
    }

    fn books_by_author_id(&self, author_id: &RecordId) -> StoreResult<Vec<Book>> {
        let Some(oid) = parse_object_id(author_id) else {
            return Ok(Vec::new());
        };

        self.find_books(Some(doc! { "autor_id": oid }), insertion_order())
    }

    fn list_books_with_authors(&self) -> StoreResult<Vec<BookWithAuthor>> {
        let mut rows = Vec::new();
        for document in self.books()?.aggregate(books_with_authors_pipeline(), None)? {
            let document = document?;
            rows.push(BookWithAuthor {
                title: required_str(&document, "titulo")?,
                year: parse_year(document.get("anio"))?,
                author_name: required_str(&document, "autor_nombre")?,
            });
        }
        Ok(rows)
    }

    fn find_books_by_author(&self, author_name: &str) -> StoreResult<Vec<BookSummary>> {
        let mut author_ids = Vec::new();
        for document in self.authors()?.find(doc! { "nombre": author_name }, None)? {
            author_ids.push(required_object_id(&document?, "_id")?);
        }
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let books = self.find_books(
            Some(doc! { "autor_id": { "$in": author_ids } }),
            doc! { "anio": 1, "_id": 1 },
        )?;
        Ok(books
            .into_iter()
            .map(|book| BookSummary::new(book.title, book.year))
            .collect())
    }

    fn update_book(&self, id: &RecordId, update: &BookUpdate) -> StoreResult<bool> {
        update.validate()?;
        let author_id = match &update.author_id {
            Some(author_id) => Some(
                parse_object_id(author_id).ok_or(ModelValidationError::MalformedAuthorId)?,
            ),
            None => None,
        };

        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };

        let books = self.books()?;
        if update.is_empty() {
            return Ok(books.count_documents(doc! { "_id": oid }, None)? > 0);
        }

        let result = books.update_one(
            doc! { "_id": oid },
            doc! { "$set": book_update_document(update, author_id) },
            None,
        )?;
        Ok(result.matched_count > 0)
    }

    fn delete_book(&self, id: &RecordId) -> StoreResult<bool> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };

        let result = self.books()?.delete_one(doc! { "_id": oid }, None)?;
        Ok(result.deleted_count > 0)
    }

    fn delete_author(&self, id: &RecordId) -> StoreResult<bool> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };

        let books = self.books()?.count_documents(doc! { "autor_id": oid }, None)?;
        if books > 0 {
            return Err(StoreError::AuthorHasBooks {
                author_id: id.clone(),
                books,
            });
        }

        let result = self.authors()?.delete_one(doc! { "_id": oid }, None)?;
        Ok(result.deleted_count > 0)
    }

    fn grouped_insert(
        &self,
        author_name: &str,
        books: &[(&str, Option<i32>)],
    ) -> StoreResult<bool> {
        validate_grouped_insert(author_name, books)?;

        let started_at = Instant::now();
        let authors = self.authors()?;
        let book_collection = self.books()?;

        let author_id = ObjectId::new();
        if let Err(err) = authors.insert_one(author_document(author_id, author_name), None) {
            let err = StoreError::from(err);
            error!(
                "event=grouped_insert module=store backend=mongo status=error step=author duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return grouped_insert_failure(err);
        }

        let documents = books
            .iter()
            .map(|(title, year)| book_document(ObjectId::new(), title, *year, author_id));
        if let Err(err) = book_collection.insert_many(documents, None) {
            let err = StoreError::from(err);
            error!(
                "event=grouped_insert module=store backend=mongo status=error step=books duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );

            let compensation = book_collection
                .delete_many(doc! { "autor_id": author_id }, None)
                .and_then(|_| authors.delete_one(doc! { "_id": author_id }, None));
            if let Err(compensation_err) = compensation {
                warn!(
                    "event=grouped_insert module=store backend=mongo status=compensation_failed author_id={} error={}",
                    author_id.to_hex(),
                    compensation_err
                );
            }

            return grouped_insert_failure(err);
        }

        info!(
            "event=grouped_insert module=store backend=mongo status=ok author_id={} books={} duration_ms={}",
            author_id.to_hex(),
            books.len(),
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.handle.take().is_some() {
            info!(
                "event=store_close module=store backend=mongo status=ok database={}",
                self.database_name
            );
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

fn ascending_index(field: &str) -> IndexModel {
    let mut keys = Document::new();
    keys.insert(field, 1);
    IndexModel::builder().keys(keys).build()
}

fn record_id(oid: &ObjectId) -> RecordId {
    RecordId::new(oid.to_hex())
}

fn parse_object_id(id: &RecordId) -> Option<ObjectId> {
    ObjectId::parse_str(id.as_str().trim()).ok()
}

pub(crate) fn author_document(id: ObjectId, name: &str) -> Document {
    doc! { "_id": id, "nombre": name }
}

pub(crate) fn book_document(
    id: ObjectId,
    title: &str,
    year: Option<i32>,
    author_id: ObjectId,
) -> Document {
    doc! {
        "_id": id,
        "titulo": title,
        "anio": year,
        "autor_id": author_id,
    }
}

/// Builds the `$set` body for a partial update; absent fields are omitted.
pub(crate) fn book_update_document(update: &BookUpdate, author_id: Option<ObjectId>) -> Document {
    let mut fields = Document::new();
    if let Some(title) = &update.title {
        fields.insert("titulo", title.as_str());
    }
    if let Some(year) = update.year {
        fields.insert("anio", year);
    }
    if let Some(author_id) = author_id {
        fields.insert("autor_id", author_id);
    }
    fields
}

/// `$lookup` + `$unwind` drops books whose author does not resolve.
pub(crate) fn books_with_authors_pipeline() -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": AUTHORS_COLLECTION,
                "localField": "autor_id",
                "foreignField": "_id",
                "as": "autor",
            }
        },
        doc! { "$unwind": "$autor" },
        doc! {
            "$project": {
                "titulo": 1,
                "anio": 1,
                "autor_nombre": "$autor.nombre",
            }
        },
        doc! { "$sort": { "autor_nombre": 1, "titulo": 1 } },
    ]
}

pub(crate) fn parse_author(document: &Document) -> StoreResult<Author> {
    Ok(Author {
        id: record_id(&required_object_id(document, "_id")?),
        name: required_str(document, "nombre")?,
    })
}

pub(crate) fn parse_book(document: &Document) -> StoreResult<Book> {
    Ok(Book {
        id: record_id(&required_object_id(document, "_id")?),
        title: required_str(document, "titulo")?,
        year: parse_year(document.get("anio"))?,
        author_id: record_id(&required_object_id(document, "autor_id")?),
    })
}

pub(crate) fn parse_year(value: Option<&Bson>) -> StoreResult<Option<i32>> {
    match value {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Int32(year)) => Ok(Some(*year)),
        Some(Bson::Int64(year)) => i32::try_from(*year)
            .map(Some)
            .map_err(|_| StoreError::InvalidData(format!("year `{year}` out of range in anio"))),
        Some(Bson::Double(year)) if year.fract() == 0.0 => Ok(Some(*year as i32)),
        Some(other) => Err(StoreError::InvalidData(format!(
            "invalid year `{other}` in anio"
        ))),
    }
}

fn required_str(document: &Document, field: &str) -> StoreResult<String> {
    document
        .get_str(field)
        .map(str::to_string)
        .map_err(|_| StoreError::InvalidData(format!("missing or non-string field `{field}`")))
}

fn required_object_id(document: &Document, field: &str) -> StoreResult<ObjectId> {
    document
        .get_object_id(field)
        .map_err(|_| StoreError::InvalidData(format!("missing or non-ObjectId field `{field}`")))
}
