//! Event payloads exchanged over the pub/sub bus.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::types::{flatten_variables, ServiceConfiguration, ServiceReplica};

/// Name of the event published after a configuration mutation.
pub const CONFIGURATION_CHANGED: &str = "configuration-changed";

/// Liveness signal of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatEvent {
    pub service_name: String,
    pub replica_id: String,
}

/// A heartbeat as delivered by the bus: either wrapped in a CloudEvents
/// envelope or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundHeartbeat {
    Envelope { data: HeartbeatEvent },
    Bare(HeartbeatEvent),
}

impl InboundHeartbeat {
    pub fn into_event(self) -> HeartbeatEvent {
        match self {
            InboundHeartbeat::Envelope { data } => data,
            InboundHeartbeat::Bare(event) => event,
        }
    }
}

/// Flattened variables of one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaConfiguration {
    pub replica_id: String,
    pub variables: Map<String, Value>,
}

impl From<&ServiceReplica> for ReplicaConfiguration {
    fn from(replica: &ServiceReplica) -> Self {
        Self {
            replica_id: replica.id.clone(),
            variables: flatten_variables(&replica.replica_variables),
        }
    }
}

/// Configuration of the affected replicas of one service after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationChangedEvent {
    pub service: String,
    pub replicas: Vec<ReplicaConfiguration>,
}

impl ConfigurationChangedEvent {
    /// Event covering every replica of the service.
    pub fn for_all_replicas(config: &ServiceConfiguration) -> Self {
        Self {
            service: config.name.clone(),
            replicas: config.replicas.iter().map(ReplicaConfiguration::from).collect(),
        }
    }

    /// Event scoped to one replica.
    pub fn for_replica(service: &str, replica: &ServiceReplica) -> Self {
        Self {
            service: service.to_string(),
            replicas: vec![ReplicaConfiguration::from(replica)],
        }
    }

    /// Wire payload: `[{replicaId, variables}]`.
    pub fn payload(&self) -> Value {
        serde_json::to_value(&self.replicas).unwrap_or(Value::Array(Vec::new()))
    }
}

/// Per-service topic configuration events are published on.
pub fn configuration_topic(service: &str, suffix: &str) -> String {
    format!("{}.{}", service, suffix)
}

/// Errors raised by event publishers. Never surfaced to REST callers.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish transport error: {0}")]
    Transport(String),

    #[error("Pub/sub rejected event with status {0}")]
    Rejected(u16),

    #[error("Publish timed out after {0} seconds")]
    Timeout(u64),

    #[error("Event channel closed")]
    ChannelClosed,
}
