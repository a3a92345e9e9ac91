use reqwest::Client;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::models::{
    BackendApplication, BackendClusterRecord, ClusterConfig, ClusterRuntime, ClusterView,
    LifecycleState,
};
use crate::services::config_source::is_excluded;
use crate::services::{http, reconciler};

/// The backend's `GET /clusters`, which already merges config and runtime per cluster.
///
/// One request per refresh. Each record is paired only with its own runtime
/// half, so no name matching happens on this side.
#[derive(Clone)]
pub struct BackendClusterSource {
    client: Client,
    backend_url: String,
    exclude_pattern: String,
}

impl BackendClusterSource {
    pub fn new(client: Client, backend_url: &str, exclude_pattern: &str) -> Self {
        Self {
            client,
            backend_url: backend_url.to_string(),
            exclude_pattern: exclude_pattern.to_string(),
        }
    }

    async fn fetch_records(&self) -> SyncResult<Vec<BackendClusterRecord>> {
        let url = http::join_url(&self.backend_url, &["clusters"])?;
        let records: Vec<BackendClusterRecord> = http::get_json(&self.client, "backend", url).await?;
        Ok(records
            .into_iter()
            .filter(|record| !is_excluded(&record.name, &self.exclude_pattern))
            .collect())
    }

    /// Views for every non-excluded record. Runtime halves outside `states` are
    /// treated as missing.
    pub async fn fetch_views(&self, states: &BTreeSet<LifecycleState>) -> SyncResult<Vec<ClusterView>> {
        let records = self.fetch_records().await?;
        debug!("Backend returned {} cluster record(s)", records.len());

        Ok(records
            .into_iter()
            .map(|record| {
                let (config, runtime) = split_record(record);
                let runtime = runtime.filter(|runtime| states.contains(&runtime.state));
                reconciler::assemble(&config, runtime.as_ref())
            })
            .collect())
    }
}

fn split_record(record: BackendClusterRecord) -> (ClusterConfig, Option<ClusterRuntime>) {
    let config = ClusterConfig {
        name: record.name.clone(),
        raw_config: record.config,
        source_key: record.parameter_name.unwrap_or_else(|| record.name.clone()),
        last_modified: record.last_modified,
    };

    let state = match record.state.as_deref().map(str::parse::<LifecycleState>) {
        Some(Ok(state)) => Some(state),
        Some(Err(e)) => {
            warn!("Cluster {}: {}; reporting it as terminated", record.name, e);
            None
        }
        None => None,
    };

    let runtime = match (record.cluster_id, state) {
        (Some(control_plane_id), Some(state)) => Some(ClusterRuntime {
            control_plane_id,
            name: record.name,
            state,
            state_change_reason: record.last_state_change_reason,
            timeline: record.timeline.unwrap_or_default().into(),
            applications: record.applications.into_iter().map(BackendApplication::into_name).collect(),
            tags: record.tags,
        }),
        _ => None,
    };

    (config, runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: serde_json::Value) -> BackendClusterRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn record_without_cluster_id_has_no_runtime() {
        let (config, runtime) = split_record(record(serde_json::json!({
            "name": "team-b",
            "config": {},
            "parameterName": "/application/ecdp-config/UAT/EMR-BASE/team-b",
            "state": "TERMINATED",
            "clusterId": null
        })));
        assert_eq!(config.source_key, "/application/ecdp-config/UAT/EMR-BASE/team-b");
        assert!(runtime.is_none());
    }

    #[test]
    fn record_with_cluster_id_maps_runtime() {
        let (config, runtime) = split_record(record(serde_json::json!({
            "name": "team-a",
            "config": {},
            "state": "RUNNING",
            "clusterId": "j-ABC",
            "timeline": { "CreationDateTime": "2024-03-01T10:00:00Z" },
            "applications": [{ "Name": "Spark", "Version": "3.5" }, "Hive"],
            "tags": [{ "Key": "team", "Value": "a" }]
        })));

        assert_eq!(config.source_key, "team-a");
        let runtime = runtime.unwrap();
        assert_eq!(runtime.control_plane_id, "j-ABC");
        assert_eq!(runtime.state, LifecycleState::Running);
        assert!(runtime.timeline.created_at.is_some());
        assert_eq!(runtime.applications, vec!["Spark".to_string(), "Hive".to_string()]);
        assert_eq!(runtime.tags[0].key, "team");
    }

    #[test]
    fn unknown_state_drops_runtime() {
        let (_, runtime) = split_record(record(serde_json::json!({
            "name": "team-c",
            "state": "HIBERNATING",
            "clusterId": "j-3"
        })));
        assert!(runtime.is_none());
    }
}
