use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Start,
    Terminate,
}

impl OperationType {
    /// Path segment of the backend endpoint for this action.
    pub fn path_segment(&self) -> &'static str {
        match self {
            OperationType::Start => "start",
            OperationType::Terminate => "terminate",
        }
    }

    /// Request type understood by the execution backend.
    pub fn request_type(&self) -> &'static str {
        match self {
            OperationType::Start => "CREATE",
            OperationType::Terminate => "DELETE",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            OperationType::Start => "creation",
            OperationType::Terminate => "termination",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub cluster_name: String,
    pub submitted_at: DateTime<Utc>,
    pub status: OperationStatus,
    pub message: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OperationRecord {
    pub fn pending(operation_type: OperationType, cluster_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type,
            cluster_name: cluster_name.to_string(),
            submitted_at: Utc::now(),
            status: OperationStatus::Pending,
            message: None,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::Pending
    }

    /// Moves a pending record to SUCCESS. Returns false if it was already resolved.
    pub fn succeed(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = OperationStatus::Success;
        self.message = Some(format!(
            "Cluster {} {} initiated successfully",
            self.cluster_name,
            self.operation_type.verb()
        ));
        self.resolved_at = Some(Utc::now());
        true
    }

    /// Moves a pending record to ERROR. Returns false if it was already resolved.
    pub fn fail(&mut self, reason: &str) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = OperationStatus::Error;
        self.message = Some(format!(
            "Failed to {} cluster: {}",
            self.operation_type.path_segment(),
            reason
        ));
        self.resolved_at = Some(Utc::now());
        true
    }
}

/// Backend confirmation that a lifecycle command was accepted.
///
/// Acceptance only; the cluster itself may still be transitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body sent to the execution backend for a lifecycle command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub cluster_name: String,
    pub job_type: String,
    pub request_type: String,
    pub fifo_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_mode: Option<String>,
}

impl CommandRequest {
    pub fn new(action: OperationType, cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            job_type: "CLUSTER".to_string(),
            request_type: action.request_type().to_string(),
            fifo_key: cluster_name.to_string(),
            termination_mode: match action {
                OperationType::Terminate => Some("IMMEDIATE".to_string()),
                OperationType::Start => None,
            },
        }
    }
}
