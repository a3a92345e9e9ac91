use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use super::{api_error, ApiError};
use crate::{
    models::{ApiResponse, ClusterEntry, ClusterListResponse, FilterRequest},
    AppState,
};

async fn list_response(state: &AppState) -> ClusterListResponse {
    let view = state.engine.view().await;
    ClusterListResponse {
        total: view.all.len(),
        clusters: view.filtered.into_iter().map(ClusterEntry::from).collect(),
        filter_text: view.filter_text,
        is_loading: view.is_loading,
        is_refreshing: view.is_refreshing,
        error: view.error,
        last_refreshed_at: view.last_refreshed_at,
        operation_in_progress: state.engine.operation_in_progress().await,
        last_operation: state.engine.last_operation().await,
    }
}

/// GET /api/v1/clusters
/// Filtered view plus refresh state. A fetch error leaves the last good snapshot in `clusters`.
pub async fn list_clusters(State(state): State<AppState>) -> Json<ApiResponse<ClusterListResponse>> {
    Json(ApiResponse::success(list_response(&state).await))
}

/// GET /api/v1/clusters/all
pub async fn list_all_clusters(State(state): State<AppState>) -> Json<ApiResponse<Vec<ClusterEntry>>> {
    let clusters = state.engine.all_clusters().await;
    Json(ApiResponse::success(clusters.into_iter().map(ClusterEntry::from).collect()))
}

/// GET /api/v1/clusters/:name
pub async fn get_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ClusterEntry>>, ApiError> {
    match state.engine.cluster(&name).await {
        Some(cluster) => Ok(Json(ApiResponse::success(cluster.into()))),
        None => Err(api_error(StatusCode::NOT_FOUND, format!("Cluster {} not found", name))),
    }
}

/// PUT /api/v1/filter
pub async fn set_filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Json<ApiResponse<ClusterListResponse>> {
    state.engine.set_filter(&request.text).await;
    Json(ApiResponse::success(list_response(&state).await))
}

/// POST /api/v1/refresh
/// Skipped (not queued) when a refresh is already running.
pub async fn refresh_clusters(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ClusterListResponse>>, ApiError> {
    let refreshed = state.engine.refresh().await?;
    if !refreshed {
        info!("Manual refresh skipped, another refresh is running");
    }
    Ok(Json(ApiResponse::success(list_response(&state).await)))
}
