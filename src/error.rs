use thiserror::Error;

/// Failures surfaced by the adapters, the dispatcher and the sync engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// Network, auth or backend-down failure while talking to a source.
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The backend explicitly refused a lifecycle transition.
    #[error("{reason}")]
    CommandRejected { reason: String },

    /// One stored entry could not be parsed. Isolated per record.
    #[error("malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    /// Another action for the same cluster has not resolved yet.
    #[error("operation already in progress for cluster {cluster_name}")]
    OperationInProgress { cluster_name: String },
}

impl SyncError {
    pub fn unavailable(source_name: &str, reason: impl ToString) -> Self {
        SyncError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        SyncError::CommandRejected {
            reason: reason.to_string(),
        }
    }

    /// Human-readable reason without the source prefix, used for operation notices.
    pub fn reason(&self) -> String {
        match self {
            SyncError::SourceUnavailable { reason, .. } => reason.clone(),
            SyncError::CommandRejected { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
