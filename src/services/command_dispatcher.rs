use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{Acknowledgement, CommandRequest, OperationType};
use crate::services::http;

/// Hands lifecycle commands to the asynchronous execution backend.
///
/// Implementations do not deduplicate; the cluster name doubles as the
/// backend's ordering key so it can coalesce rapid repeats.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn submit(&self, action: OperationType, cluster_name: &str) -> SyncResult<Acknowledgement>;
}

#[derive(Clone)]
pub struct HttpCommandDispatcher {
    client: Client,
    backend_url: String,
}

impl HttpCommandDispatcher {
    pub fn new(client: Client, backend_url: &str) -> Self {
        Self {
            client,
            backend_url: backend_url.to_string(),
        }
    }
}

#[async_trait]
impl CommandDispatcher for HttpCommandDispatcher {
    async fn submit(&self, action: OperationType, cluster_name: &str) -> SyncResult<Acknowledgement> {
        let url = http::join_url(&self.backend_url, &["clusters", cluster_name, action.path_segment()])?;
        let body = CommandRequest::new(action, cluster_name);

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::unavailable("execution backend", e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = http::error_message(response).await;
            warn!("Backend refused {} for cluster {}: {} ({})", action, cluster_name, reason, status);
            // Gateway errors mean the backend itself is unreachable
            if matches!(status.as_u16(), 502..=504) && reason.starts_with("HTTP ") {
                return Err(SyncError::unavailable("execution backend", reason));
            }
            return Err(SyncError::rejected(reason));
        }

        let ack = match response.json::<Acknowledgement>().await {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Unreadable acknowledgement for {} {}: {}", action, cluster_name, e);
                Acknowledgement { status: None, message: None }
            }
        };

        info!("Backend accepted {} for cluster {}", action, cluster_name);
        Ok(ack)
    }
}
