//! Author records.

use super::book::Book;
use super::record_id::RecordId;
use serde::{Deserialize, Serialize};

/// A stored author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: RecordId,
    pub name: String,
}

/// Author detail together with every book referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorBooks {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}
