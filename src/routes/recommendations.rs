use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Recommendation, RecommendationQuery},
    routes::AppState,
    services::recommendations,
};

/// Handler for the book recommendation endpoint
///
/// The correlation pass is CPU-bound, so it runs on the blocking pool with its
/// own handle on the shared dataset.
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let book = query.entry_book.to_lowercase();
    let author = query.entry_author.to_lowercase();

    tracing::info!(
        request_id = %request_id,
        book = %book,
        author = %author,
        num_of_results = query.num_of_results,
        "Processing recommendation request"
    );

    let dataset = state.dataset.clone();
    let result = tokio::task::spawn_blocking(move || {
        recommendations::recommend(&dataset, &book, &author, query.num_of_results)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    match &result {
        Ok(books) => tracing::info!(request_id = %request_id, results = books.len(), "Recommendation completed"),
        Err(e) => tracing::info!(request_id = %request_id, error = %e, "Recommendation failed"),
    }

    Ok(Json(result?))
}
