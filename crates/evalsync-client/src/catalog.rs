//! HTTP client for the service's catalog endpoints
//!
//! These are plain request/response collaborators next to the live
//! session: the list of available scenarios and the user/group
//! metadata a scenario ships with.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, SyncError};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// URL-encode a resource ID for use in path segments, so an ID with a
/// literal `/` stays a single segment.
fn encode_path_segment(id: &str) -> String {
    id.replace('/', "%2F")
}

/// A user a scenario makes available for the `user` context field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioUser {
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Catalog REST client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
}

impl CatalogClient {
    /// Create a new catalog client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the service (e.g., "http://localhost:8100")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new catalog client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the scenario names available on the service.
    #[instrument(skip(self))]
    pub async fn directories(&self) -> Result<Vec<String>> {
        let url = self.base_url.join("/directories")?;
        debug!("listing directories from {}", url);

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Fetch the users (and their groups) a scenario defines.
    #[instrument(skip(self))]
    pub async fn users(&self, scenario: &str) -> Result<BTreeMap<String, ScenarioUser>> {
        let url = self
            .base_url
            .join(&format!("/users/{}", encode_path_segment(scenario)))?;

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| SyncError::Parse(e.to_string()))
        } else {
            Err(self.extract_error(response).await)
        }
    }

    async fn extract_error(&self, response: reqwest::Response) -> SyncError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        SyncError::server_error(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_encoding() {
        assert_eq!(encode_path_segment("nested/dir"), "nested%2Fdir");
        assert_eq!(encode_path_segment("plain"), "plain");
    }

    #[test]
    fn scenario_user_deserializes_with_missing_groups() {
        let user: ScenarioUser = serde_json::from_str("{}").unwrap();
        assert!(user.groups.is_empty());

        let users: BTreeMap<String, ScenarioUser> =
            serde_json::from_str(r#"{"alice": {"groups": ["dev", "ops"]}}"#).unwrap();
        assert_eq!(users["alice"].groups, vec!["dev", "ops"]);
    }
}
