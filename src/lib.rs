// FleetDeck controller library
// Public modules are exported for the binary and the integration tests

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod sync_engine;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::SyncError;
pub use sync_engine::SyncEngine;

use handlers::{cluster_handler, health_handler, operation_handler, statistics_handler};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: SyncEngine,
}

/// Routes serving the presentation layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/api/v1/clusters", get(cluster_handler::list_clusters))
        .route("/api/v1/clusters/all", get(cluster_handler::list_all_clusters))
        .route("/api/v1/clusters/stats", get(statistics_handler::get_statistics))
        .route("/api/v1/clusters/:name", get(cluster_handler::get_cluster))
        .route("/api/v1/clusters/:name/start", post(operation_handler::start_cluster))
        .route("/api/v1/clusters/:name/terminate", post(operation_handler::terminate_cluster))
        .route("/api/v1/filter", put(cluster_handler::set_filter))
        .route("/api/v1/refresh", post(cluster_handler::refresh_clusters))
        .route("/api/v1/operations", get(operation_handler::list_operations))
        .route("/api/v1/operations/last", get(operation_handler::last_operation))
        .route("/api/v1/operations/:name", delete(operation_handler::dismiss_operation))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
