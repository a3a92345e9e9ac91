use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::{api_error, ApiError};
use crate::{
    models::{Acknowledgement, ApiResponse, OperationRecord, OperationType},
    AppState,
};

async fn submit(state: &AppState, action: OperationType, name: &str) -> Result<Json<ApiResponse<Acknowledgement>>, ApiError> {
    let ack = state.engine.submit(action, name).await?;
    let message = ack.message.clone();
    let mut response = ApiResponse::success(ack);
    response.message = message;
    Ok(Json(response))
}

/// POST /api/v1/clusters/:name/start
pub async fn start_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Acknowledgement>>, ApiError> {
    submit(&state, OperationType::Start, &name).await
}

/// POST /api/v1/clusters/:name/terminate
pub async fn terminate_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Acknowledgement>>, ApiError> {
    submit(&state, OperationType::Terminate, &name).await
}

/// GET /api/v1/operations
pub async fn list_operations(State(state): State<AppState>) -> Json<ApiResponse<Vec<OperationRecord>>> {
    Json(ApiResponse::success(state.engine.operations().await))
}

/// GET /api/v1/operations/last
pub async fn last_operation(State(state): State<AppState>) -> Json<ApiResponse<Option<OperationRecord>>> {
    Json(ApiResponse::success(state.engine.last_operation().await))
}

/// DELETE /api/v1/operations/:name
pub async fn dismiss_operation(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if state.engine.dismiss_operation(&name).await {
        Ok(Json(ApiResponse::message(format!("Notice for {} dismissed", name))))
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No resolved operation for cluster {}", name),
        ))
    }
}
