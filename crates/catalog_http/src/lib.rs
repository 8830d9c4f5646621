//! HTTP surface for the book catalog.
//!
//! One store sits behind a mutex; every store call runs on the blocking
//! pool so the synchronous core never sees two callers at once.

pub mod api;
pub mod error;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use catalog_core::{CatalogService, CatalogStore, StoreResult};
use error::{ApiError, ApiResult};
use log::info;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Service type shared by all handlers.
pub type DynCatalogService = CatalogService<Box<dyn CatalogStore + Send>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<DynCatalogService>>,
}

impl AppState {
    pub fn new(service: DynCatalogService) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    /// Runs `op` against the service on the blocking pool.
    pub async fn run<T, F>(&self, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DynCatalogService) -> StoreResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || {
            let guard = service
                .lock()
                .map_err(|_| ApiError::Internal("catalog service lock poisoned".to_string()))?;
            op(&guard).map_err(ApiError::from)
        })
        .await
        .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
    }

    /// Closes the underlying store. Later requests fail with 503.
    pub async fn shutdown(&self) -> ApiResult<()> {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || {
            let mut guard = service
                .lock()
                .map_err(|_| ApiError::Internal("catalog service lock poisoned".to_string()))?;
            guard.close().map_err(ApiError::from)
        })
        .await
        .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health_check))
        .route(
            "/authors",
            get(api::authors::list_authors).post(api::authors::create_author),
        )
        .route(
            "/authors/:id",
            get(api::authors::get_author).delete(api::authors::delete_author),
        )
        .route(
            "/books",
            get(api::books::list_books).post(api::books::create_book),
        )
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;

    info!(
        "event=http_request module=http status={} method={} path={} duration_ms={}",
        response.status().as_u16(),
        method,
        path,
        started_at.elapsed().as_millis()
    );
    response
}
