use super::AppState;
use crate::types::ServiceInfo;
use axum::{Json, extract::State};

pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: Some(env!("CARGO_PKG_DESCRIPTION").to_string()),
        data: state.data_location.clone(),
        index: state.index_location.clone(),
    })
}
