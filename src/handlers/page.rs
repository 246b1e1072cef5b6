use super::AppState;
use crate::{
    Result,
    types::{PageQuery, PageResponse},
};
use axum::{
    Json,
    extract::{Query, State},
};

pub async fn get_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse>> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(state.page_size);

    let result = state
        .pager
        .get_page(page, page_size, |text| state.parser.parse(text))
        .await?;

    Ok(Json(PageResponse {
        page: result.page,
        requested_page: result.requested_page,
        page_size: result.page_size,
        columns: state.parser.columns().map(<[String]>::to_vec),
        rows: result.rows.into_iter().map(|r| r.fields).collect(),
        degraded: result.degraded,
        failed_blocks: result.failed_blocks,
        fell_back: result.fell_back,
    }))
}
