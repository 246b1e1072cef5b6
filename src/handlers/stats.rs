use super::AppState;
use crate::{
    Error, Result,
    types::{PageQuery, StatsResponse},
};
use axum::{
    Json,
    extract::{Query, State},
};

pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<StatsResponse>> {
    let page_size = query.page_size.unwrap_or(state.page_size);
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be positive".to_string()));
    }

    state.pager.try_initialize().await?;
    let stats = state
        .pager
        .file_stats()
        .await
        .ok_or_else(|| Error::Internal("index not loaded".to_string()))?;

    Ok(Json(StatsResponse {
        stats,
        page_size,
        total_pages: stats.total_pages(page_size),
    }))
}
