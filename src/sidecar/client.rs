//! Sidecar HTTP client with timeout and error handling.
//!
//! # Responsibilities
//! - Fetch a service's declared variables from its sidecar
//! - Bound the request with the configured timeout
//! - Map every failure to `UpstreamUnavailable`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;
use url::Url;

use crate::config::SidecarConfig;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::types::ConfigurationVariableDefinition;

/// Source of variable definitions, queried once per registration.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn fetch_definitions(&self, service: &str) -> RegistryResult<Vec<ConfigurationVariableDefinition>>;
}

/// `GET .../defined-variables` response body.
#[derive(Debug, Deserialize)]
pub struct DefinedVariablesResponse {
    pub configuration: BTreeMap<String, DeclaredVariable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredVariable {
    #[serde(rename = "type")]
    pub schema: Value,
    #[serde(default)]
    pub default_value: Value,
}

impl DefinedVariablesResponse {
    /// Definitions ordered by key.
    pub fn into_definitions(self) -> Vec<ConfigurationVariableDefinition> {
        self.configuration
            .into_iter()
            .map(|(key, declared)| ConfigurationVariableDefinition {
                key,
                schema: declared.schema,
                default_value: declared.default_value,
            })
            .collect()
    }
}

/// Client for `<base>/<service>/method/<defined-variables method>`.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: reqwest::Client,
    base_url: Url,
    method: String,
    timeout_duration: Duration,
}

impl SidecarClient {
    pub fn new(config: &SidecarConfig) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&config.base_url)?;
        let timeout_duration = Duration::from_secs(config.timeout_secs);

        tracing::info!(
            base_url = %base_url,
            timeout_secs = config.timeout_secs,
            "Sidecar client initialized"
        );

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            method: config.defined_variables_method.clone(),
            timeout_duration,
        })
    }

    /// URL of the defined-variables method of `service`.
    pub fn definitions_url(&self, service: &str) -> RegistryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| unavailable(service, format!("sidecar URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(service)
            .push("method")
            .extend(self.method.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

fn unavailable(service: &str, reason: impl Into<String>) -> RegistryError {
    RegistryError::UpstreamUnavailable {
        service: service.to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl DefinitionSource for SidecarClient {
    async fn fetch_definitions(&self, service: &str) -> RegistryResult<Vec<ConfigurationVariableDefinition>> {
        let url = self.definitions_url(service)?;
        tracing::debug!(service = %service, url = %url, "Fetching variable definitions");

        let response = match timeout(self.timeout_duration, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(unavailable(service, e.to_string())),
            Err(_) => {
                return Err(unavailable(
                    service,
                    format!("timed out after {} seconds", self.timeout_duration.as_secs()),
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(service, format!("sidecar returned status {}", status)));
        }

        let body: DefinedVariablesResponse = response
            .json()
            .await
            .map_err(|e| unavailable(service, format!("invalid definitions body: {}", e)))?;

        Ok(body.into_definitions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> SidecarConfig {
        SidecarConfig {
            base_url: "http://127.0.0.1:3500/v1.0/invoke".to_string(),
            defined_variables_method: "_ecs/defined-variables".to_string(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn test_definitions_url() {
        let client = SidecarClient::new(&test_config()).unwrap();
        assert_eq!(
            client.definitions_url("orders").unwrap().as_str(),
            "http://127.0.0.1:3500/v1.0/invoke/orders/method/_ecs/defined-variables"
        );
        // Service names are single path segments
        assert_eq!(
            client.definitions_url("a/b").unwrap().as_str(),
            "http://127.0.0.1:3500/v1.0/invoke/a%2Fb/method/_ecs/defined-variables"
        );
    }

    #[test]
    fn test_response_decoding() {
        let body: DefinedVariablesResponse = serde_json::from_value(json!({
            "configuration": {
                "timeoutMs": { "type": { "type": "integer" }, "defaultValue": 500 },
                "mode": { "type": "string", "defaultValue": "fast" },
                "optional": { "type": { "type": ["string", "null"] } }
            }
        }))
        .unwrap();

        let definitions = body.into_definitions();
        let keys: Vec<_> = definitions.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["mode", "optional", "timeoutMs"]);
        assert_eq!(definitions[2].default_value, json!(500));
        assert_eq!(definitions[1].default_value, Value::Null);
    }

    #[tokio::test]
    async fn test_unreachable_sidecar() {
        let mut config = test_config();
        config.base_url = "http://127.0.0.1:1/v1.0/invoke".to_string();
        let client = SidecarClient::new(&config).unwrap();

        let err = client.fetch_definitions("orders").await.unwrap_err();
        assert!(matches!(err, RegistryError::UpstreamUnavailable { ref service, .. } if service == "orders"));
    }
}
