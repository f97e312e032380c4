//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the registry.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the registry.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Sidecar used to discover variable definitions.
    pub sidecar: SidecarConfig,

    /// Pub/sub bus settings.
    pub pubsub: PubSubConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Invocation base URL; the service name is appended as a path segment.
    pub base_url: String,

    /// Method path serving the variable declarations.
    pub defined_variables_method: String,

    /// Registration round-trip timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3500/v1.0/invoke".to_string(),
            defined_variables_method: "_ecs/defined-variables".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Pub/sub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Publish configuration changes. When false events are discarded.
    pub enabled: bool,

    /// Base URL of the pub/sub HTTP API.
    pub base_url: String,

    /// Name of the pub/sub component.
    pub pubsub_name: String,

    /// Topic heartbeats arrive on.
    pub heartbeat_topic: String,

    /// Configuration topics are `<service>.<suffix>`.
    pub configuration_topic_suffix: String,

    /// Publish timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:3500".to_string(),
            pubsub_name: "pubsub".to_string(),
            heartbeat_topic: "heartbeat".to_string(),
            configuration_topic_suffix: "configuration".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
