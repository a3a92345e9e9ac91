use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::ClusterConfig;
use crate::services::http;

/// Source of stored cluster configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Returns every non-excluded config record, in store order.
    async fn fetch(&self) -> SyncResult<Vec<ClusterConfig>>;
}

#[derive(Debug, Deserialize)]
struct ParameterPage {
    #[serde(rename = "Parameters", default)]
    parameters: Vec<StoredParameter>,
    #[serde(rename = "NextToken", default)]
    next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoredParameter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "LastModifiedDate", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Hierarchical key/value config store, one JSON document per cluster under a path prefix.
#[derive(Clone)]
pub struct ParameterStoreSource {
    client: Client,
    parameters_url: String,
    path_prefix: String,
    exclude_pattern: String,
}

impl ParameterStoreSource {
    pub fn new(client: Client, parameters_url: &str, path_prefix: &str, exclude_pattern: &str) -> Self {
        Self {
            client,
            parameters_url: parameters_url.to_string(),
            path_prefix: path_prefix.to_string(),
            exclude_pattern: exclude_pattern.to_string(),
        }
    }

    async fn fetch_page(&self, next_token: Option<&str>) -> SyncResult<ParameterPage> {
        let mut url = reqwest::Url::parse(&self.parameters_url)
            .map_err(|e| SyncError::unavailable("config store", e))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("path", &self.path_prefix)
                .append_pair("recursive", "true")
                .append_pair("with_decryption", "true");
            if let Some(token) = next_token {
                query.append_pair("next_token", token);
            }
        }

        http::get_json(&self.client, "config store", url).await
    }
}

#[async_trait]
impl ConfigSource for ParameterStoreSource {
    async fn fetch(&self) -> SyncResult<Vec<ClusterConfig>> {
        // Pages are only kept once the whole walk succeeds
        let mut parameters = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(next_token.as_deref()).await?;
            pages += 1;
            parameters.extend(page.parameters);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!("Fetched {} parameters in {} page(s)", parameters.len(), pages);
        Ok(parameters_to_configs(parameters, &self.path_prefix, &self.exclude_pattern))
    }
}

/// Turns raw store entries into configs.
///
/// The cluster name is the key with the prefix stripped. Entries whose name
/// contains `exclude_pattern` are dropped; an empty pattern excludes nothing.
/// Values that are not valid JSON are kept as `{"rawValue": <string>}`.
pub fn parameters_to_configs(
    parameters: Vec<StoredParameter>,
    path_prefix: &str,
    exclude_pattern: &str,
) -> Vec<ClusterConfig> {
    parameters
        .into_iter()
        .filter_map(|parameter| {
            let name = parameter
                .name
                .strip_prefix(path_prefix)
                .unwrap_or(parameter.name.as_str())
                .to_string();

            if is_excluded(&name, exclude_pattern) {
                return None;
            }

            let raw_config = match serde_json::from_str::<serde_json::Value>(&parameter.value) {
                Ok(value) => value,
                Err(e) => {
                    let err = SyncError::MalformedRecord {
                        key: parameter.name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}; keeping raw value", err);
                    serde_json::json!({ "rawValue": parameter.value })
                }
            };

            Some(ClusterConfig {
                name,
                raw_config,
                source_key: parameter.name,
                last_modified: parameter.last_modified,
            })
        })
        .collect()
}

pub(crate) fn is_excluded(name: &str, exclude_pattern: &str) -> bool {
    !exclude_pattern.is_empty() && name.contains(exclude_pattern)
}
