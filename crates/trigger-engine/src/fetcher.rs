//! Remote config fetching
//!
//! Pulls the raw config document from a project endpoint over HTTPS. The
//! fetcher stops at the JSON boundary: validation and installation belong to
//! `TriggerEngine::apply_config`, so a fetched document is handed over as an
//! untyped value.

use std::time::Duration;

use campaign_core::error::{EngineError, Result};
use serde_json::Value;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// HTTP client for the campaign config endpoint
pub struct ConfigFetcher {
    client: reqwest::Client,
    endpoint: url::Url,
    project_id: String,
    api_key: Option<String>,
}

impl ConfigFetcher {
    /// Build a fetcher for one project endpoint
    ///
    /// # Errors
    ///
    /// `EngineError::Fetch` when the endpoint is not an absolute http(s) URL.
    pub fn new(
        endpoint: &str,
        project_id: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| EngineError::fetch(format!("Invalid config endpoint: {}", e)))?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(EngineError::fetch(format!(
                "Unsupported config endpoint scheme '{}'; push the config document directly via apply_config instead",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| EngineError::fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            project_id: project_id.into(),
            api_key,
        })
    }

    /// Fetch the current config document as untyped JSON
    ///
    /// # Errors
    ///
    /// `EngineError::Fetch` on transport failures, non-success status codes
    /// and bodies that are not valid JSON.
    pub async fn fetch(&self) -> Result<Value> {
        tracing::debug!(endpoint = %self.endpoint, project_id = %self.project_id, "Fetching campaign config");

        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header("X-Project-Id", &self.project_id);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::fetch(format!("Config request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::fetch(format!(
                "Config endpoint returned {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EngineError::fetch(format!("Config body is not valid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = ConfigFetcher::new("ftp://configs.example.com/project", "proj-1", None);
        match result {
            Err(EngineError::Fetch(message)) => {
                assert!(message.contains("ftp"));
                assert!(message.contains("apply_config"));
            }
            other => panic!("expected fetch error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_relative_endpoint() {
        assert!(ConfigFetcher::new("/configs/project", "proj-1", None).is_err());
    }

    #[test]
    fn test_accepts_https_endpoint() {
        assert!(ConfigFetcher::new("https://configs.example.com/project", "proj-1", Some("key".into())).is_ok());
    }
}
