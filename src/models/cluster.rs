use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::OperationType;

/// Lifecycle states reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Starting,
    Bootstrapping,
    Running,
    Waiting,
    Terminating,
    Terminated,
    TerminatedWithErrors,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 7] = [
        LifecycleState::Starting,
        LifecycleState::Bootstrapping,
        LifecycleState::Running,
        LifecycleState::Waiting,
        LifecycleState::Terminating,
        LifecycleState::Terminated,
        LifecycleState::TerminatedWithErrors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "STARTING",
            LifecycleState::Bootstrapping => "BOOTSTRAPPING",
            LifecycleState::Running => "RUNNING",
            LifecycleState::Waiting => "WAITING",
            LifecycleState::Terminating => "TERMINATING",
            LifecycleState::Terminated => "TERMINATED",
            LifecycleState::TerminatedWithErrors => "TERMINATED_WITH_ERRORS",
        }
    }

    /// Active clusters expose a terminate control, everything else a start control.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LifecycleState::Starting
                | LifecycleState::Bootstrapping
                | LifecycleState::Running
                | LifecycleState::Waiting
        )
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            LifecycleState::TerminatedWithErrors => "FAILED",
            other => other.as_str(),
        }
    }

    pub fn available_action(&self) -> OperationType {
        if self.is_active() {
            OperationType::Terminate
        } else {
            OperationType::Start
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LifecycleState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown lifecycle state: {}", s))
    }
}

/// One cluster's stored configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub name: String,
    #[serde(rename = "config")]
    pub raw_config: serde_json::Value,
    #[serde(rename = "parameterName")]
    pub source_key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub created_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTag {
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    #[serde(rename = "Value", alias = "value", default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeReason {
    #[serde(rename = "Code", alias = "code", default)]
    pub code: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
}

/// Live status of one cluster as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRuntime {
    pub control_plane_id: String,
    pub name: String,
    pub state: LifecycleState,
    pub state_change_reason: Option<StateChangeReason>,
    pub timeline: Timeline,
    pub applications: Vec<String>,
    pub tags: Vec<ClusterTag>,
}

/// Config merged with at most one runtime record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub name: String,
    #[serde(rename = "config")]
    pub raw_config: serde_json::Value,
    #[serde(rename = "parameterName")]
    pub source_key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub state: LifecycleState,
    pub cluster_id: Option<String>,
    pub last_state_change_reason: Option<StateChangeReason>,
    pub timeline: Option<Timeline>,
    pub applications: Vec<String>,
    pub tags: Vec<ClusterTag>,
}

impl ClusterView {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// A merged record as served by the backend's `GET /clusters`.
///
/// Unknown states are tolerated: the record is kept with `state: None` and the
/// runtime half is dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendClusterRecord {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub parameter_name: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub last_state_change_reason: Option<StateChangeReason>,
    #[serde(default)]
    pub timeline: Option<BackendTimeline>,
    #[serde(default)]
    pub applications: Vec<BackendApplication>,
    #[serde(default)]
    pub tags: Vec<ClusterTag>,
}

/// The backend forwards the control plane's timeline keys as-is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendTimeline {
    #[serde(rename = "CreationDateTime", alias = "createdAt", default)]
    pub creation: Option<DateTime<Utc>>,
    #[serde(rename = "EndDateTime", alias = "endedAt", default)]
    pub end: Option<DateTime<Utc>>,
}

impl From<BackendTimeline> for Timeline {
    fn from(t: BackendTimeline) -> Self {
        Timeline {
            created_at: t.creation,
            ended_at: t.end,
        }
    }
}

/// Applications arrive either as bare names or as `{"Name": ..., "Version": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendApplication {
    Name(String),
    Detailed {
        #[serde(rename = "Name", alias = "name")]
        name: String,
    },
}

impl BackendApplication {
    pub fn into_name(self) -> String {
        match self {
            BackendApplication::Name(name) => name,
            BackendApplication::Detailed { name } => name,
        }
    }
}
