use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: Value,
}

impl Variable {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub key: String,
    #[serde(rename = "type")]
    pub schema: Value,
    #[serde(default)]
    pub default_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    pub id: String,
    pub replica_variables: Vec<Variable>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub replicas: Vec<Replica>,
    pub global_variables: Vec<Variable>,
    pub variable_definitions: Vec<VariableDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Violation {
    pub key: String,
    pub path: String,
    pub message: String,
}

/// Error body returned by the registry for any non-2xx answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Vec<Violation>,
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status}: {}", body.message)]
    Api { status: u16, body: ApiErrorBody },

    #[error("registry returned {status}: {text}")]
    Unexpected { status: u16, text: String },
}

impl SdkError {
    /// HTTP status of an error answer, if the registry answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } | SdkError::Unexpected { status, .. } => Some(*status),
            SdkError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// Registry error code (`NOT_FOUND`, `VALIDATION_FAILED`, ...).
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Api { body, .. } => Some(&body.code),
            _ => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    registry_url: String,
}

impl RegistryClient {
    pub fn new(registry_url: &str) -> Self {
        Self {
            client: Client::new(),
            registry_url: registry_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.registry_url, path))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SdkResult<T> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(error_from(status.as_u16(), resp.text().await?))
    }

    async fn send_empty(&self, request: RequestBuilder) -> SdkResult<()> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(error_from(status.as_u16(), resp.text().await?))
    }

    pub async fn health(&self) -> SdkResult<Value> {
        self.send(self.request(Method::GET, "/healthz")).await
    }

    /// Deliver a heartbeat the way the pub/sub sidecar does. Returns the
    /// delivery status (`SUCCESS` or `DROP`).
    pub async fn heartbeat(&self, service: &str, replica: &str) -> SdkResult<String> {
        let body = json!({ "data": { "serviceName": service, "replicaId": replica } });
        let answer: Value = self
            .send(self.request(Method::POST, "/events/heartbeat").json(&body))
            .await?;
        Ok(answer["status"].as_str().unwrap_or_default().to_string())
    }

    pub async fn services(&self) -> SdkResult<Vec<Service>> {
        self.send(self.request(Method::GET, "/configuration")).await
    }

    pub async fn service_names(&self) -> SdkResult<Vec<String>> {
        self.send(self.request(Method::GET, "/configuration/names")).await
    }

    pub async fn service(&self, service: &str) -> SdkResult<Service> {
        self.send(self.request(Method::GET, &format!("/configuration/{}", service)))
            .await
    }

    pub async fn delete_service(&self, service: &str) -> SdkResult<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/configuration/{}", service)))
            .await
    }

    pub async fn defined_variables(&self, service: &str) -> SdkResult<Vec<VariableDefinition>> {
        self.send(self.request(Method::GET, &format!("/configuration/{}/defined-variables", service)))
            .await
    }

    pub async fn service_variables(&self, service: &str) -> SdkResult<Vec<Variable>> {
        self.send(self.request(Method::GET, &format!("/configuration/{}/variables", service)))
            .await
    }

    pub async fn put_service_variables(&self, service: &str, variables: &[Variable]) -> SdkResult<Vec<Variable>> {
        self.send(
            self.request(Method::PUT, &format!("/configuration/{}/variables", service))
                .json(&json!({ "variables": variables })),
        )
        .await
    }

    pub async fn service_variable(&self, service: &str, key: &str) -> SdkResult<Variable> {
        self.send(self.request(Method::GET, &format!("/configuration/{}/variables/{}", service, key)))
            .await
    }

    pub async fn put_service_variable(&self, service: &str, key: &str, value: Value) -> SdkResult<Variable> {
        self.send(
            self.request(Method::PUT, &format!("/configuration/{}/variables/{}", service, key))
                .json(&json!({ "value": value })),
        )
        .await
    }

    pub async fn replicas(&self, service: &str) -> SdkResult<Vec<Replica>> {
        self.send(self.request(Method::GET, &format!("/configuration/{}/replicas", service)))
            .await
    }

    pub async fn delete_replica(&self, service: &str, replica: &str) -> SdkResult<()> {
        self.send_empty(self.request(
            Method::DELETE,
            &format!("/configuration/{}/replicas/{}", service, replica),
        ))
        .await
    }

    pub async fn replica_variables(&self, service: &str, replica: &str) -> SdkResult<Vec<Variable>> {
        self.send(self.request(
            Method::GET,
            &format!("/configuration/{}/replicas/{}/variables", service, replica),
        ))
        .await
    }

    pub async fn put_replica_variables(
        &self,
        service: &str,
        replica: &str,
        variables: &[Variable],
    ) -> SdkResult<Vec<Variable>> {
        self.send(
            self.request(
                Method::PUT,
                &format!("/configuration/{}/replicas/{}/variables", service, replica),
            )
            .json(&json!({ "variables": variables })),
        )
        .await
    }

    pub async fn replica_variable(&self, service: &str, replica: &str, key: &str) -> SdkResult<Variable> {
        self.send(self.request(
            Method::GET,
            &format!("/configuration/{}/replicas/{}/variables/{}", service, replica, key),
        ))
        .await
    }

    pub async fn put_replica_variable(
        &self,
        service: &str,
        replica: &str,
        key: &str,
        value: Value,
    ) -> SdkResult<Variable> {
        self.send(
            self.request(
                Method::PUT,
                &format!("/configuration/{}/replicas/{}/variables/{}", service, replica, key),
            )
            .json(&json!({ "value": value })),
        )
        .await
    }
}

fn error_from(status: u16, text: String) -> SdkError {
    match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => SdkError::Api { status, body },
        Err(_) => SdkError::Unexpected { status, text },
    }
}
