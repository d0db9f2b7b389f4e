use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{Page, PageQuery},
    routes::AppState,
    services::catalog::paginate,
};

/// Paginated list of distinct book titles, in dataset order
pub async fn books(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<String>>> {
    let page = paginate(state.dataset.list_books(), params.page, params.page_size)?;
    Ok(Json(page))
}

/// Paginated list of distinct authors, in dataset order
pub async fn authors(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<String>>> {
    let page = paginate(state.dataset.list_authors(), params.page, params.page_size)?;
    Ok(Json(page))
}
