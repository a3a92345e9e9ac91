use axum::{extract::State, response::Json};
use tracing::debug;

use crate::{
    models::{ApiResponse, ClusterStats},
    services::stats,
    AppState,
};

/// GET /api/v1/clusters/stats
/// Counts clusters per lifecycle state over the unfiltered snapshot.
pub async fn get_statistics(State(state): State<AppState>) -> Json<ApiResponse<ClusterStats>> {
    let clusters = state.engine.all_clusters().await;
    let stats = stats::cluster_stats(&clusters);
    debug!("Cluster statistics: {} total, {} states", stats.total, stats.by_state.len());
    Json(ApiResponse::success(stats))
}
