//! Author endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use catalog_core::{Author, AuthorBooks, RecordId};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Create author request
#[derive(Debug, Deserialize)]
pub struct CreateAuthor {
    pub name: Option<String>,
}

/// List every author in insertion order
pub async fn list_authors(State(state): State<AppState>) -> ApiResult<Json<Vec<Author>>> {
    let authors = state.run(|service| service.list_authors()).await?;
    Ok(Json(authors))
}

/// Create an author from `{"name"}`
pub async fn create_author(
    State(state): State<AppState>,
    payload: Result<Json<CreateAuthor>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Author>)> {
    let Json(request) = payload?;
    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("field `name` is required".to_string()))?;

    let author = state
        .run(move |service| {
            let id = service.add_author(&name)?;
            Ok(Author { id, name })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(author)))
}

/// Get an author with its books
pub async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AuthorBooks>> {
    let id = RecordId::new(id);
    let lookup = id.clone();
    state
        .run(move |service| service.author_with_books(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("author {id} does not exist")))
}

/// Delete an author no book references
pub async fn delete_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = RecordId::new(id);
    let target = id.clone();
    if state.run(move |service| service.delete_author(&target)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("author {id} does not exist")))
    }
}
