use std::sync::Arc;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::Dataset,
    error::AppResult,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::DatasetSource,
};

pub mod listings;
pub mod recommendations;

/// Shared application state
///
/// The dataset is loaded once and only ever read, so handlers share it
/// through an `Arc` without locking.
#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
}

impl AppState {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }

    /// Loads the dataset from `source` and wraps it for sharing
    pub async fn load(source: &dyn DatasetSource, force_refresh: bool) -> AppResult<Self> {
        let dataset = source.load(force_refresh).await?;

        tracing::info!(
            source = source.name(),
            records = dataset.len(),
            books = dataset.list_books().len(),
            authors = dataset.list_authors().len(),
            "Dataset loaded"
        );

        Ok(Self::new(dataset))
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/book_recommend", get(recommendations::recommend))
        .route("/books", get(listings::books))
        .route("/authors", get(listings::authors))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let dataset = &state.dataset;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "records": dataset.len(),
            "books": dataset.list_books().len(),
            "authors": dataset.list_authors().len(),
            "loaded_at": dataset.loaded_at(),
        })),
    )
}
