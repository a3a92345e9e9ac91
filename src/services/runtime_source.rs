use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::models::{
    BackendApplication, BackendTimeline, ClusterRuntime, ClusterTag, LifecycleState,
    StateChangeReason,
};
use crate::services::http;

/// Source of live cluster status.
#[async_trait]
pub trait RuntimeSource: Send + Sync {
    /// Returns clusters currently in any of `states`.
    async fn fetch(&self, states: &BTreeSet<LifecycleState>) -> SyncResult<Vec<ClusterRuntime>>;
}

#[derive(Debug, Deserialize)]
struct ListClustersPage {
    #[serde(rename = "Clusters", default)]
    clusters: Vec<ControlPlaneCluster>,
    #[serde(rename = "Marker", default)]
    marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ControlPlaneCluster {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Status")]
    status: ControlPlaneStatus,
    #[serde(rename = "Applications", default)]
    applications: Vec<BackendApplication>,
    #[serde(rename = "Tags", default)]
    tags: Vec<ClusterTag>,
}

#[derive(Debug, Deserialize)]
struct ControlPlaneStatus {
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "StateChangeReason", default)]
    state_change_reason: Option<StateChangeReason>,
    #[serde(rename = "Timeline", default)]
    timeline: Option<BackendTimeline>,
}

/// Control-plane `list clusters` endpoint, filtered by lifecycle state.
#[derive(Clone)]
pub struct ControlPlaneSource {
    client: Client,
    clusters_url: String,
}

impl ControlPlaneSource {
    pub fn new(client: Client, clusters_url: &str) -> Self {
        Self {
            client,
            clusters_url: clusters_url.to_string(),
        }
    }

    async fn fetch_page(
        &self,
        states: &BTreeSet<LifecycleState>,
        marker: Option<&str>,
    ) -> SyncResult<ListClustersPage> {
        let mut url = reqwest::Url::parse(&self.clusters_url)
            .map_err(|e| crate::error::SyncError::unavailable("control plane", e))?;
        {
            let joined = states.iter().map(LifecycleState::as_str).collect::<Vec<_>>().join(",");
            let mut query = url.query_pairs_mut();
            query.append_pair("states", &joined);
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        http::get_json(&self.client, "control plane", url).await
    }
}

#[async_trait]
impl RuntimeSource for ControlPlaneSource {
    async fn fetch(&self, states: &BTreeSet<LifecycleState>) -> SyncResult<Vec<ClusterRuntime>> {
        let mut runtimes = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self.fetch_page(states, marker.as_deref()).await?;
            runtimes.extend(page.clusters.into_iter().filter_map(into_runtime));

            match page.marker {
                Some(next) if !next.is_empty() => marker = Some(next),
                _ => break,
            }
        }

        runtimes.retain(|runtime| states.contains(&runtime.state));
        debug!("Control plane reported {} cluster(s)", runtimes.len());
        Ok(runtimes)
    }
}

fn into_runtime(cluster: ControlPlaneCluster) -> Option<ClusterRuntime> {
    let state = match cluster.status.state.parse::<LifecycleState>() {
        Ok(state) => state,
        Err(e) => {
            warn!("Skipping cluster {} ({}): {}", cluster.name, cluster.id, e);
            return None;
        }
    };

    Some(ClusterRuntime {
        control_plane_id: cluster.id,
        name: cluster.name,
        state,
        state_change_reason: cluster.status.state_change_reason,
        timeline: cluster.status.timeline.unwrap_or_default().into(),
        applications: cluster.applications.into_iter().map(BackendApplication::into_name).collect(),
        tags: cluster.tags,
    })
}
