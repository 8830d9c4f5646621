//! Book endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use catalog_core::{Book, BookUpdate, NewBook, RecordId};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Create book request
#[derive(Debug, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author_id: Option<RecordId>,
    pub year: Option<i32>,
}

/// Update book request; absent fields keep their stored value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub year: Option<i32>,
}

/// List every book in insertion order
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<Book>>> {
    let books = state.run(|service| service.list_books()).await?;
    Ok(Json(books))
}

/// Create a book for an existing author
pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let Json(request) = payload?;
    let title = request
        .title
        .ok_or_else(|| ApiError::BadRequest("field `title` is required".to_string()))?;
    let author_id = request
        .author_id
        .ok_or_else(|| ApiError::BadRequest("field `author_id` is required".to_string()))?;

    let missing_author = author_id.clone();
    let book = NewBook::new(title, request.year, author_id);
    state
        .run(move |service| service.add_book_checked(&book))
        .await?
        .map(|book| (StatusCode::CREATED, Json(book)))
        .ok_or_else(|| ApiError::NotFound(format!("author {missing_author} does not exist")))
}

/// Get a book by id
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Book>> {
    let id = RecordId::new(id);
    let lookup = id.clone();
    state
        .run(move |service| service.get_book(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("book {id} does not exist")))
}

/// Update title and/or year of a book
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> ApiResult<Json<Book>> {
    let Json(request) = payload?;
    let update = BookUpdate {
        title: request.title,
        year: request.year,
        author_id: None,
    };

    let id = RecordId::new(id);
    let target = id.clone();
    state
        .run(move |service| service.update_book_returning(&target, &update))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("book {id} does not exist")))
}

/// Delete a book by id
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = RecordId::new(id);
    let target = id.clone();
    if state.run(move |service| service.delete_book(&target)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("book {id} does not exist")))
    }
}
