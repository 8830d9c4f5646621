//! Command-line interface for the author/book catalog.
//!
//! Every command opens the configured store, runs one catalog operation and
//! closes the store. Output is plain text unless `--json` is given.

use anyhow::{anyhow, bail, Result};
use catalog_core::config::DEFAULT_FILE_STORE;
use catalog_core::{
    Author, Book, BookSummary, BookUpdate, BookWithAuthor, CatalogService, CatalogStore,
    NewBook, RecordId, SqliteCatalogStore, StoreConfig,
};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

type Service = CatalogService<Box<dyn CatalogStore + Send>>;

/// Command-line interface configuration.
#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Manage a catalog of authors and books in SQLite or MongoDB")]
#[command(version)]
pub struct Cli {
    /// Store to open: sqlite::memory:, sqlite:<path>, <file>.db or mongodb://...
    #[arg(long, short, env = "CATALOG_STORE", default_value = DEFAULT_FILE_STORE)]
    pub store: String,

    /// MongoDB database name
    #[arg(long, env = "CATALOG_MONGO_DATABASE")]
    pub database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CATALOG_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Write rotating log files here instead of stderr (absolute path)
    #[arg(long, env = "CATALOG_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(long, short = 'J', env = "CATALOG_JSON")]
    pub json: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the store, creating tables or collections if missing
    Init,
    /// Author operations
    Author {
        #[command(subcommand)]
        command: AuthorCommands,
    },
    /// Book operations
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Insert one author and its books as a unit
    GroupInsert {
        /// Author name
        author: String,
        /// Book as `title` or `title:year`; repeat for several books
        #[arg(long = "book", required = true)]
        books: Vec<String>,
    },
    /// Dump every SQLite table as JSON
    ExportJson {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run the seed/list/update/delete/grouped-insert walkthrough
    Demo,
}

#[derive(Subcommand)]
pub enum AuthorCommands {
    /// Add one or more authors
    Add {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List all authors
    List,
    /// Show an author and its books
    Show { id: String },
    /// Delete an author that has no books
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum BookCommands {
    /// Add a book for an existing author
    Add {
        title: String,
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        year: Option<i32>,
    },
    /// List all books
    List {
        /// Join with author names (dangling books are left out)
        #[arg(long)]
        with_authors: bool,
    },
    /// Find books by exact author name
    Find { author: String },
    /// Update title, year or author of a book
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        author_id: Option<String>,
    },
    /// Delete a book
    Delete { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.log_dir {
        Some(dir) => catalog_core::init_logging(&cli.log_level, &dir.to_string_lossy()),
        None => catalog_core::init_stderr_logging(&cli.log_level),
    }
    .map_err(|err| anyhow!(err))?;

    let mut config = StoreConfig::parse(&cli.store)?;
    if let Some(database) = &cli.database {
        config = config.with_database(database.clone());
    }
    config.ensure_supported()?;

    if let Commands::ExportJson { output } = &cli.command {
        return export_json(&config, output.as_ref());
    }

    let mut service = CatalogService::new(config.open()?);
    info!(
        "event=cli_command module=cli status=start backend={}",
        config.backend()
    );

    let result = match cli.command {
        Commands::Init => {
            print_status(&format!("{} schema ready", config.backend()), cli.json);
            Ok(())
        }
        Commands::Author { command } => handle_author_command(&service, command, cli.json),
        Commands::Book { command } => handle_book_command(&service, command, cli.json),
        Commands::GroupInsert { author, books } => {
            handle_group_insert(&service, &author, &books, cli.json)
        }
        Commands::Demo => handle_demo(&service, cli.json),
        Commands::ExportJson { .. } => Ok(()),
    };

    service.close()?;
    result
}

/// Handles author-related CLI commands.
fn handle_author_command(service: &Service, command: AuthorCommands, json: bool) -> Result<()> {
    match command {
        AuthorCommands::Add { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let ids = service.add_authors(&names)?;
            let authors: Vec<Author> = ids
                .into_iter()
                .zip(names)
                .map(|(id, name)| Author {
                    id,
                    name: name.to_string(),
                })
                .collect();
            output_authors(&authors, json)?;
        }

        AuthorCommands::List => {
            output_authors(&service.list_authors()?, json)?;
        }

        AuthorCommands::Show { id } => {
            let Some(detail) = service.author_with_books(&RecordId::new(id.clone()))? else {
                bail!("author {id} does not exist");
            };
            if json {
                print_json(&detail)?;
            } else {
                println!("{}: {}", detail.author.id, detail.author.name);
                output_books(&detail.books, false)?;
            }
        }

        AuthorCommands::Delete { id } => {
            if !service.delete_author(&RecordId::new(id.clone()))? {
                bail!("author {id} does not exist");
            }
            print_status("author deleted", json);
        }
    }

    Ok(())
}

/// Handles book-related CLI commands.
fn handle_book_command(service: &Service, command: BookCommands, json: bool) -> Result<()> {
    match command {
        BookCommands::Add {
            title,
            author_id,
            year,
        } => {
            let book = NewBook::new(title, year, author_id.clone());
            let Some(stored) = service.add_book_checked(&book)? else {
                bail!("author {author_id} does not exist");
            };
            output_books(std::slice::from_ref(&stored), json)?;
        }

        BookCommands::List { with_authors } => {
            if with_authors {
                output_joined(&service.list_books_with_authors()?, json)?;
            } else {
                output_books(&service.list_books()?, json)?;
            }
        }

        BookCommands::Find { author } => {
            output_summaries(&service.find_books_by_author(&author)?, json)?;
        }

        BookCommands::Update {
            id,
            title,
            year,
            author_id,
        } => {
            let update = BookUpdate {
                title,
                year,
                author_id: author_id.map(RecordId::new),
            };
            let Some(book) = service.update_book_returning(&RecordId::new(id.clone()), &update)?
            else {
                bail!("book {id} does not exist");
            };
            output_books(std::slice::from_ref(&book), json)?;
        }

        BookCommands::Delete { id } => {
            if !service.delete_book(&RecordId::new(id.clone()))? {
                bail!("book {id} does not exist");
            }
            print_status("book deleted", json);
        }
    }

    Ok(())
}

fn handle_group_insert(service: &Service, author: &str, books: &[String], json: bool) -> Result<()> {
    let parsed: Vec<(&str, Option<i32>)> = books.iter().map(|spec| parse_book_spec(spec)).collect();
    if !service.grouped_insert(author, &parsed)? {
        bail!("grouped insert for {author} failed; nothing was stored");
    }
    print_status("grouped insert committed", json);
    Ok(())
}

fn handle_demo(service: &Service, json: bool) -> Result<()> {
    let report = service.run_demo()?;
    if json {
        return print_json(&report);
    }

    println!("Books with authors:");
    output_joined(&report.initial_listing, false)?;
    println!("\nBooks by {}:", report.lookup_author);
    output_summaries(&report.lookup, false)?;
    println!("\nAfter update (updated={}):", report.updated);
    output_joined(&report.after_update, false)?;
    println!("\nAfter delete (deleted={}):", report.deleted);
    output_joined(&report.after_delete, false)?;
    println!("\nGrouped insert committed: {}", report.grouped_insert);
    output_authors(&report.authors, false)
}

fn export_json(config: &StoreConfig, output: Option<&PathBuf>) -> Result<()> {
    let mut store = match config {
        StoreConfig::SqliteMemory => SqliteCatalogStore::open_in_memory()?,
        StoreConfig::SqliteFile(path) => SqliteCatalogStore::open(path)?,
        StoreConfig::Mongo { .. } => bail!("export-json is only available for SQLite stores"),
    };

    let exported = serde_json::to_string_pretty(&store.export_tables_json()?)?;
    match output {
        Some(path) => {
            std::fs::write(path, exported)?;
            info!(
                "event=export_json module=cli status=ok path={}",
                path.display()
            );
        }
        None => println!("{exported}"),
    }

    store.close()?;
    Ok(())
}

/// Splits `title:year`; a suffix that is not a year stays part of the title.
fn parse_book_spec(spec: &str) -> (&str, Option<i32>) {
    match spec.rsplit_once(':') {
        Some((title, year)) => match year.trim().parse::<i32>() {
            Ok(year) => (title, Some(year)),
            Err(_) => (spec, None),
        },
        None => (spec, None),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_status(message: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "status": message }));
    } else {
        println!("{message}");
    }
}

fn output_authors(authors: &[Author], json: bool) -> Result<()> {
    if json {
        return print_json(authors);
    }
    println!("Authors ({} total):", authors.len());
    for author in authors {
        println!("  - {}: {}", author.id, author.name);
    }
    Ok(())
}

fn output_books(books: &[Book], json: bool) -> Result<()> {
    if json {
        return print_json(books);
    }
    println!("Books ({} total):", books.len());
    for book in books {
        println!(
            "  - {}: {} ({}) [author {}]",
            book.id,
            book.title,
            format_year(book.year),
            book.author_id
        );
    }
    Ok(())
}

fn output_joined(rows: &[BookWithAuthor], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    for row in rows {
        println!(
            "  - {} ({}) by {}",
            row.title,
            format_year(row.year),
            row.author_name
        );
    }
    Ok(())
}

fn output_summaries(rows: &[BookSummary], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    if rows.is_empty() {
        println!("  (no books)");
    }
    for row in rows {
        println!("  - {} ({})", row.title, format_year(row.year));
    }
    Ok(())
}

fn format_year(year: Option<i32>) -> String {
    year.map_or_else(|| "n/a".to_string(), |year| year.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_book_spec, Cli};
    use catalog_core::config::DEFAULT_FILE_STORE;
    use catalog_core::StoreConfig;
    use clap::CommandFactory;
    use std::path::PathBuf;

    #[test]
    fn book_spec_splits_trailing_year() {
        assert_eq!(parse_book_spec("El hobbit:1937"), ("El hobbit", Some(1937)));
        assert_eq!(parse_book_spec("Sin fecha"), ("Sin fecha", None));
        assert_eq!(
            parse_book_spec("Borges: una vida"),
            ("Borges: una vida", None)
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_store_is_a_sqlite_file() {
        let command = Cli::command();
        let store = command
            .get_arguments()
            .find(|arg| arg.get_id() == "store")
            .unwrap();
        let defaults: Vec<&str> = store
            .get_default_values()
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();

        assert_eq!(defaults, vec![DEFAULT_FILE_STORE]);
        assert_eq!(
            StoreConfig::parse(DEFAULT_FILE_STORE).unwrap(),
            StoreConfig::SqliteFile(PathBuf::from("catalog.db"))
        );
    }
}
