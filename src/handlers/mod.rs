mod page;
mod service_info;
mod stats;

pub use page::get_page;
pub use service_info::service_info;
pub use stats::get_stats;

use crate::pager::Pager;
use crate::records::TsvParser;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pager: Arc<Pager>,
    pub parser: Arc<TsvParser>,
    /// Page size used when a request does not give one
    pub page_size: u64,
    pub data_location: String,
    pub index_location: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/page", get(get_page))
        .route("/stats", get(get_stats))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
