//! API handlers for catalog REST endpoints

pub mod authors;
pub mod books;
pub mod health;
