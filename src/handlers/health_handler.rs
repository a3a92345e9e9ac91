use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let view = state.engine.view().await;

    let health_data = json!({
        "status": if view.error.is_some() { "degraded" } else { "healthy" },
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "fleetdeck-controller",
        "version": env!("CARGO_PKG_VERSION"),
        "pollIntervalSecs": state.engine.settings().poll_interval.as_secs(),
        "lastRefreshedAt": view.last_refreshed_at,
        "sourceError": view.error,
    });

    Ok(Json(health_data))
}
