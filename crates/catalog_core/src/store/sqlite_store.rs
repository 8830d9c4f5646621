//! SQLite-backed catalog store.
//!
//! # Responsibility
//! - Provide the catalog operations over `authors` and `books` tables.
//! - Keep every SQL statement parameterised, including partial updates.
//!
//! # Invariants
//! - The connection has migrations applied before the first query.
//! - Multi-row writes run inside one transaction.
//! - Row ids are exposed as decimal `RecordId`s.

use super::catalog_store::{
    grouped_insert_failure, validate_grouped_insert, CatalogStore, StoreError, StoreResult,
};
use crate::db::migrations::apply_migrations;
use crate::db::{open_db, open_db_in_memory, open_db_with_script};
use crate::model::author::Author;
use crate::model::book::{Book, BookSummary, BookUpdate, BookWithAuthor, NewBook};
use crate::model::record_id::RecordId;
use crate::model::{validate_author_name, ModelValidationError};
use log::{error, info, warn};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Instant;

const BOOK_SELECT_SQL: &str = "SELECT id, title, year, author_id FROM books";

/// Catalog store over one owned SQLite connection.
pub struct SqliteCatalogStore {
    conn: Option<Connection>,
}

impl SqliteCatalogStore {
    /// Opens (or creates) a database file with the catalog schema applied.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database with the catalog schema applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Recreates the database at `path` from a SQL script.
    ///
    /// The script runs first against an empty file; catalog migrations are
    /// applied afterwards, so scripts may create and seed the catalog tables.
    pub fn open_from_script(
        path: impl AsRef<Path>,
        script_path: impl AsRef<Path>,
    ) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_with_script(path, script_path)?))
    }

    /// Wraps an existing connection. Call `create_schema` before use when the
    /// connection did not come from `crate::db`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Borrows the open connection.
    pub fn connection(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// Lists user tables in name order.
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT name
             FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name;",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Dumps every user table as `{ table: [ { column: value } ] }`.
    pub fn export_tables_json(&self) -> StoreResult<serde_json::Value> {
        let conn = self.connection()?;
        let mut tables = serde_json::Map::new();

        for table in self.table_names()? {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM \"{}\";",
                table.replace('"', "\"\"")
            ))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = serde_json::Map::new();
                for (index, column) in columns.iter().enumerate() {
                    record.insert(column.clone(), json_value(row.get_ref(index)?));
                }
                records.push(serde_json::Value::Object(record));
            }

            tables.insert(table, serde_json::Value::Array(records));
        }

        Ok(serde_json::Value::Object(tables))
    }

    fn book_exists(&self, row_id: i64) -> StoreResult<bool> {
        let exists: i64 = self.connection()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1);",
            [row_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn query_books(&self, sql: &str, bind: &[Value]) -> StoreResult<Vec<Book>> {
        let mut stmt = self.connection()?.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind.iter()))?;
        let mut books = Vec::new();
        while let Some(row) = rows.next()? {
            books.push(parse_book_row(row)?);
        }
        Ok(books)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn create_schema(&self) -> StoreResult<()> {
        apply_migrations(self.connection()?)?;
        Ok(())
    }

    fn add_authors(&self, names: &[&str]) -> StoreResult<Vec<RecordId>> {
        for name in names {
            validate_author_name(name)?;
        }

        let tx = self.connection()?.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(names.len());
        {
            let mut stmt = tx.prepare("INSERT INTO authors (name) VALUES (?1);")?;
            for name in names {
                ids.push(RecordId::from(stmt.insert([*name])?));
            }
        }
        tx.commit()?;

        Ok(ids)
    }

    fn add_books(&self, books: &[NewBook]) -> StoreResult<Vec<RecordId>> {
        let mut author_row_ids = Vec::with_capacity(books.len());
        for book in books {
            book.validate()?;
            author_row_ids.push(author_row_id(&book.author_id)?);
        }

        let tx = self.connection()?.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(books.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO books (title, year, author_id) VALUES (?1, ?2, ?3);")?;
            for (book, author_row_id) in books.iter().zip(author_row_ids) {
                ids.push(RecordId::from(stmt.insert(params![
                    book.title.as_str(),
                    book.year,
                    author_row_id
                ])?));
            }
        }
        tx.commit()?;

        Ok(ids)
    }

    fn list_authors(&self) -> StoreResult<Vec<Author>> {
        let mut stmt = self
            .connection()?
            .prepare("SELECT id, name FROM authors ORDER BY id;")?;
        let mut rows = stmt.query([])?;
        let mut authors = Vec::new();
        while let Some(row) = rows.next()? {
            authors.push(parse_author_row(row)?);
        }
        Ok(authors)
    }

    fn get_author(&self, id: &RecordId) -> StoreResult<Option<Author>> {
        let Some(row_id) = id.as_row_id() else {
            return Ok(None);
        };

        let mut stmt = self
            .connection()?
            .prepare("SELECT id, name FROM authors WHERE id = ?1;")?;
        let mut rows = stmt.query([row_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_author_row(row)?));
        }

        Ok(None)
    }

    fn list_books(&self) -> StoreResult<Vec<Book>> {
        self.query_books(&format!("{BOOK_SELECT_SQL} ORDER BY id;"), &[])
    }

    fn get_book(&self, id: &RecordId) -> StoreResult<Option<Book>> {
        let Some(row_id) = id.as_row_id() else {
            return Ok(None);
        };

        let mut books = self.query_books(
            &format!("{BOOK_SELECT_SQL} WHERE id = ?1;"),
            &[Value::Integer(row_id)],
        )?;
        Ok(books.pop())
    }

    fn books_by_author_id(&self, author_id: &RecordId) -> StoreResult<Vec<Book>> {
        let Some(row_id) = author_id.as_row_id() else {
            return Ok(Vec::new());
        };

        self.query_books(
            &format!("{BOOK_SELECT_SQL} WHERE author_id = ?1 ORDER BY id;"),
            &[Value::Integer(row_id)],
        )
    }

    fn list_books_with_authors(&self) -> StoreResult<Vec<BookWithAuthor>> {
        let mut stmt = self.connection()?.prepare(
            "SELECT books.title, books.year, authors.name
             FROM books
             INNER JOIN authors ON authors.id = books.author_id
             ORDER BY books.id;",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(BookWithAuthor {
                    title: row.get(0)?,
                    year: row.get(1)?,
                    author_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find_books_by_author(&self, author_name: &str) -> StoreResult<Vec<BookSummary>> {
        let mut stmt = self.connection()?.prepare(
            "SELECT books.title, books.year
             FROM books
             INNER JOIN authors ON authors.id = books.author_id
             WHERE authors.name = ?1
             ORDER BY books.id;",
        )?;
        let rows = stmt
            .query_map([author_name], |row| {
                Ok(BookSummary {
                    title: row.get(0)?,
                    year: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_book(&self, id: &RecordId, update: &BookUpdate) -> StoreResult<bool> {
        update.validate()?;
        let author_row_id = update.author_id.as_ref().map(author_row_id).transpose()?;

        let Some(row_id) = id.as_row_id() else {
            return Ok(false);
        };

        if update.is_empty() {
            return self.book_exists(row_id);
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = &update.title {
            assignments.push("title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(year) = update.year {
            assignments.push("year = ?");
            bind_values.push(Value::Integer(i64::from(year)));
        }
        if let Some(author_row_id) = author_row_id {
            assignments.push("author_id = ?");
            bind_values.push(Value::Integer(author_row_id));
        }
        bind_values.push(Value::Integer(row_id));

        let sql = format!("UPDATE books SET {} WHERE id = ?;", assignments.join(", "));
        let changed = self
            .connection()?
            .execute(&sql, params_from_iter(bind_values))?;

        Ok(changed > 0)
    }

    fn delete_book(&self, id: &RecordId) -> StoreResult<bool> {
        let Some(row_id) = id.as_row_id() else {
            return Ok(false);
        };

        let changed = self
            .connection()?
            .execute("DELETE FROM books WHERE id = ?1;", [row_id])?;
        Ok(changed > 0)
    }

    fn delete_author(&self, id: &RecordId) -> StoreResult<bool> {
        let Some(row_id) = id.as_row_id() else {
            return Ok(false);
        };

        let tx = Transaction::new_unchecked(self.connection()?, TransactionBehavior::Immediate)?;
        let books: i64 = tx.query_row(
            "SELECT COUNT(*) FROM books WHERE author_id = ?1;",
            [row_id],
            |row| row.get(0),
        )?;
        if books > 0 {
            return Err(StoreError::AuthorHasBooks {
                author_id: id.clone(),
                books: books as u64,
            });
        }

        let changed = tx.execute("DELETE FROM authors WHERE id = ?1;", [row_id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn grouped_insert(
        &self,
        author_name: &str,
        books: &[(&str, Option<i32>)],
    ) -> StoreResult<bool> {
        validate_grouped_insert(author_name, books)?;

        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.connection()?, TransactionBehavior::Immediate)?;

        let author_row_id = match insert_author_with_books(&tx, author_name, books) {
            Ok(author_row_id) => author_row_id,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=grouped_insert module=store backend=sqlite status=rollback_failed error={rollback_err}"
                    );
                }
                error!(
                    "event=grouped_insert module=store backend=sqlite status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return grouped_insert_failure(err);
            }
        };

        if let Err(err) = tx.commit() {
            let err = StoreError::from(err);
            error!(
                "event=grouped_insert module=store backend=sqlite status=error duration_ms={} error_code=commit_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return grouped_insert_failure(err);
        }

        info!(
            "event=grouped_insert module=store backend=sqlite status=ok author_id={} books={} duration_ms={}",
            author_row_id,
            books.len(),
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    fn close(&mut self) -> StoreResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                info!("event=store_close module=store backend=sqlite status=ok");
                Ok(())
            }
            Err((_conn, err)) => {
                error!("event=store_close module=store backend=sqlite status=error error={err}");
                Err(err.into())
            }
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

fn insert_author_with_books(
    tx: &Transaction<'_>,
    author_name: &str,
    books: &[(&str, Option<i32>)],
) -> StoreResult<i64> {
    let author_row_id = tx
        .prepare("INSERT INTO authors (name) VALUES (?1);")?
        .insert([author_name])?;

    let mut stmt = tx.prepare("INSERT INTO books (title, year, author_id) VALUES (?1, ?2, ?3);")?;
    for (title, year) in books {
        stmt.insert(params![title, year, author_row_id])?;
    }

    Ok(author_row_id)
}

fn author_row_id(author_id: &RecordId) -> Result<i64, ModelValidationError> {
    author_id
        .as_row_id()
        .ok_or(ModelValidationError::MalformedAuthorId)
}

fn parse_author_row(row: &Row<'_>) -> StoreResult<Author> {
    Ok(Author {
        id: RecordId::from(row.get::<_, i64>("id")?),
        name: row.get("name")?,
    })
}

fn parse_book_row(row: &Row<'_>) -> StoreResult<Book> {
    let author_id = match row.get_ref("author_id")? {
        ValueRef::Integer(value) => RecordId::from(value),
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid author reference `{other:?}` in books.author_id"
            )));
        }
    };

    Ok(Book {
        id: RecordId::from(row.get::<_, i64>("id")?),
        title: row.get("title")?,
        year: row.get("year")?,
        author_id,
    })
}

fn json_value(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(number) => serde_json::Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => serde_json::Value::from(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::json_value;
    use rusqlite::types::ValueRef;

    #[test]
    fn json_value_maps_sqlite_storage_classes() {
        assert_eq!(json_value(ValueRef::Null), serde_json::Value::Null);
        assert_eq!(json_value(ValueRef::Integer(1967)), serde_json::json!(1967));
        assert_eq!(json_value(ValueRef::Real(9.5)), serde_json::json!(9.5));
        assert_eq!(
            json_value(ValueRef::Text(b"Ficciones")),
            serde_json::json!("Ficciones")
        );
        assert_eq!(json_value(ValueRef::Blob(&[1, 2])), serde_json::json!([1, 2]));
    }

    #[test]
    fn json_value_maps_nan_to_null() {
        assert_eq!(json_value(ValueRef::Real(f64::NAN)), serde_json::Value::Null);
    }
}
