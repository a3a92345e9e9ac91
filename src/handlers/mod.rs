pub mod cluster_handler;
pub mod health_handler;
pub mod operation_handler;
pub mod statistics_handler;

use axum::{http::StatusCode, response::Json};

use crate::error::SyncError;
use crate::models::ApiResponse;

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::OperationInProgress { .. } => StatusCode::CONFLICT,
            SyncError::CommandRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::SourceUnavailable { .. } => StatusCode::BAD_GATEWAY,
            SyncError::MalformedRecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, err.to_string())
    }
}
