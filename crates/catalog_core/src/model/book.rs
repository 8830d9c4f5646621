//! Book records plus the write models used to create and patch them.

use super::record_id::RecordId;
use super::{validate_book_title, ModelValidationError};
use serde::{Deserialize, Serialize};

/// A stored book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: RecordId,
    pub title: String,
    pub year: Option<i32>,
    pub author_id: RecordId,
}

/// Insert payload for one book.
///
/// `author_id` is stored as given; stores do not check that it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub year: Option<i32>,
    pub author_id: RecordId,
}

impl NewBook {
    pub fn new(title: impl Into<String>, year: Option<i32>, author_id: impl Into<RecordId>) -> Self {
        Self {
            title: title.into(),
            year,
            author_id: author_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_book_title(&self.title)
    }
}

/// Partial update for a book. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub author_id: Option<RecordId>,
}

impl BookUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_author_id(mut self, author_id: impl Into<RecordId>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Returns whether no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.year.is_none() && self.author_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        match self.title.as_deref() {
            Some(title) => validate_book_title(title),
            None => Ok(()),
        }
    }
}

/// Join row: one book with the name of the author it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookWithAuthor {
    pub title: String,
    pub year: Option<i32>,
    pub author_name: String,
}

/// Title and year of a book, as returned by author-name lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub year: Option<i32>,
}

impl BookSummary {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BookUpdate, NewBook};
    use crate::model::ModelValidationError;

    #[test]
    fn empty_update_is_detected() {
        assert!(BookUpdate::default().is_empty());
        assert!(!BookUpdate::year(1999).is_empty());
        assert!(!BookUpdate::default().with_author_id("3").is_empty());
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert_eq!(
            NewBook::new("   ", Some(1937), 1).validate(),
            Err(ModelValidationError::EmptyBookTitle)
        );
        assert_eq!(
            BookUpdate::title("").validate(),
            Err(ModelValidationError::EmptyBookTitle)
        );
        assert!(BookUpdate::year(2001).validate().is_ok());
    }
}
