use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use catalog_core::{CatalogService, CatalogStore, SqliteCatalogStore};
use catalog_http::{create_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let store: Box<dyn CatalogStore + Send> =
        Box::new(SqliteCatalogStore::open_in_memory().unwrap());
    let state = AppState::new(CatalogService::new(store));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_author(app: &Router, name: &str) -> Value {
    let (status, body) = send(app, Method::POST, "/authors", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], catalog_core::core_version());
}

#[tokio::test]
async fn authors_are_created_listed_and_shown_with_books() {
    let (app, _) = app();
    let author = create_author(&app, "Isabel Allende").await;
    assert_eq!(author["name"], "Isabel Allende");
    let author_id = author["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "Paula", "author_id": author_id, "year": 1994 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, authors) = send(&app, Method::GET, "/authors", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(authors, json!([{ "id": author_id, "name": "Isabel Allende" }]));

    let (status, detail) = send(&app, Method::GET, &format!("/authors/{author_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Isabel Allende");
    assert_eq!(detail["books"][0]["title"], "Paula");
    assert_eq!(detail["books"][0]["year"], 1994);
}

#[tokio::test]
async fn unknown_author_returns_404_with_error_body() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/authors/41", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("41"));
}

#[tokio::test]
async fn author_creation_requires_name() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::POST, "/authors", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = send(&app, Method::POST, "/authors", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn book_creation_validates_fields_and_author() {
    let (app, _) = app();

    let (status, _) = send(&app, Method::POST, "/books", Some(json!({ "author_id": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/books", Some(json!({ "title": "Rayuela" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "Rayuela", "author_id": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, books) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (app, _) = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/authors")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\":"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn book_lifecycle_get_update_delete() {
    let (app, _) = app();
    let author = create_author(&app, "Jorge Luis Borges").await;
    let (_, book) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "Ficciones", "author_id": author["id"], "year": 1944 })),
    )
    .await;
    let book_uri = format!("/books/{}", book["id"].as_str().unwrap());

    let (status, fetched) = send(&app, Method::GET, &book_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, book);

    let (status, updated) = send(&app, Method::PUT, &book_uri, Some(json!({ "year": 1956 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Ficciones");
    assert_eq!(updated["year"], 1956);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &book_uri,
        Some(json!({ "title": "Ficciones (1956)" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Ficciones (1956)");
    assert_eq!(updated["year"], 1956);

    let (status, body) = send(&app, Method::DELETE, &book_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::DELETE, &book_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &book_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::PUT, &book_uri, Some(json!({ "year": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_deletion_conflicts_while_books_exist() {
    let (app, _) = app();
    let author = create_author(&app, "Julio Cortázar").await;
    let author_uri = format!("/authors/{}", author["id"].as_str().unwrap());
    let (_, book) = send(
        &app,
        Method::POST,
        "/books",
        Some(json!({ "title": "Rayuela", "author_id": author["id"], "year": 1963 })),
    )
    .await;

    let (status, body) = send(&app, Method::DELETE, &author_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let book_uri = format!("/books/{}", book["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &book_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, &author_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &author_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn closed_store_returns_503() {
    let (app, state) = app();
    state.shutdown().await.unwrap();

    let (status, body) = send(&app, Method::GET, "/authors", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "store_unavailable");
}
