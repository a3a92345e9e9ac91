use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::error::SyncError;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Appends path segments to a base URL, percent-encoding each one.
pub fn join_url(base: &str, segments: &[&str]) -> Result<Url, SyncError> {
    let mut url = Url::parse(base).map_err(|e| SyncError::unavailable(base, e))?;
    url.path_segments_mut()
        .map_err(|_| SyncError::unavailable(base, "URL cannot be a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Pulls the `{"error": ...}` message out of a failed response, falling back to the status line.
pub async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody { error: Some(message) }) if !message.is_empty() => message,
        _ if !text.trim().is_empty() && text.len() < 512 => format!("HTTP {} - {}", status, text.trim()),
        _ => format!("HTTP {}", status),
    }
}

/// Sends a GET and decodes the JSON body, mapping every failure to `SourceUnavailable`.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    source_name: &str,
    url: Url,
) -> Result<T, SyncError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SyncError::unavailable(source_name, e))?;

    if !response.status().is_success() {
        return Err(SyncError::unavailable(source_name, error_message(response).await));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::unavailable(source_name, format!("invalid response body: {}", e)))
}
