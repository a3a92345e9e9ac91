use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ClusterView, OperationRecord, OperationType};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            message: None,
        }
    }

    pub fn message(message: String) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message),
        }
    }
}

/// One cluster as the dashboard renders it: the view plus its label and control.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEntry {
    #[serde(flatten)]
    pub cluster: ClusterView,
    pub display_state: String,
    pub active: bool,
    pub available_action: OperationType,
}

impl From<ClusterView> for ClusterEntry {
    fn from(cluster: ClusterView) -> Self {
        Self {
            display_state: cluster.state.display_label().to_string(),
            active: cluster.is_active(),
            available_action: cluster.state.available_action(),
            cluster,
        }
    }
}

/// What the dashboard polls: the filtered view plus refresh bookkeeping.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterListResponse {
    pub clusters: Vec<ClusterEntry>,
    pub total: usize,
    pub filter_text: String,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub operation_in_progress: bool,
    pub last_operation: Option<OperationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StateCount {
    pub count: usize,
    /// Share of the total, rounded to one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub total: usize,
    pub by_state: BTreeMap<String, StateCount>,
}
