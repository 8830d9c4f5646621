//! Catalog domain model: authors, books and their opaque identities.
//!
//! # Responsibility
//! - Define the records exchanged between stores, services and surfaces.
//! - Validate caller input before any store mutation happens.
//!
//! # Invariants
//! - Every record is identified by a `RecordId` that callers treat as opaque.
//! - Author names and book titles are never empty or whitespace-only.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod author;
pub mod book;
pub mod record_id;

/// Input rejected before reaching the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyAuthorName,
    EmptyBookTitle,
    EmptyBookBatch,
    MalformedAuthorId,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAuthorName => write!(f, "author name must not be empty"),
            Self::EmptyBookTitle => write!(f, "book title must not be empty"),
            Self::EmptyBookBatch => write!(f, "grouped insert requires at least one book"),
            Self::MalformedAuthorId => write!(f, "author id is not valid for this store"),
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn validate_author_name(name: &str) -> Result<(), ModelValidationError> {
    if name.trim().is_empty() {
        return Err(ModelValidationError::EmptyAuthorName);
    }
    Ok(())
}

pub(crate) fn validate_book_title(title: &str) -> Result<(), ModelValidationError> {
    if title.trim().is_empty() {
        return Err(ModelValidationError::EmptyBookTitle);
    }
    Ok(())
}
