//! Heartbeat event forwarding.
//!
//! Consumes heartbeats from the bus, hands them to the registry and, when a
//! heartbeat introduced a new replica to an active service, publishes that
//! replica's seeded configuration so the instance picks up its variables.
//! Replicas that join during registration are left to the activation event.

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::publisher::EventPublisher;
use crate::events::types::{configuration_topic, ConfigurationChangedEvent, HeartbeatEvent, CONFIGURATION_CHANGED};
use crate::observability::metrics;
use crate::registry::error::RegistryResult;
use crate::registry::types::HeartbeatOutcome;

/// Registry capability the forwarder depends on.
#[async_trait]
pub trait HeartbeatHandler: Send + Sync {
    async fn heartbeat(&self, service: &str, replica_id: &str) -> RegistryResult<HeartbeatOutcome>;

    /// Current configuration of a single replica, as an event.
    async fn replica_configuration(&self, service: &str, replica_id: &str) -> RegistryResult<ConfigurationChangedEvent>;
}

pub struct EventForwarder {
    handler: Arc<dyn HeartbeatHandler>,
    publisher: Arc<dyn EventPublisher>,
    topic_suffix: String,
}

impl EventForwarder {
    pub fn new(handler: Arc<dyn HeartbeatHandler>, publisher: Arc<dyn EventPublisher>, topic_suffix: impl Into<String>) -> Self {
        Self {
            handler,
            publisher,
            topic_suffix: topic_suffix.into(),
        }
    }

    /// Process one heartbeat. Failures are logged; heartbeats have no caller
    /// waiting on the result.
    pub async fn forward(&self, event: HeartbeatEvent) -> Option<HeartbeatOutcome> {
        let outcome = match self.handler.heartbeat(&event.service_name, &event.replica_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    service = %event.service_name,
                    replica = %event.replica_id,
                    error = %e,
                    "Heartbeat dropped"
                );
                return None;
            }
        };

        if outcome == HeartbeatOutcome::ReplicaAdded {
            self.publish_replica(&event).await;
        }
        Some(outcome)
    }

    async fn publish_replica(&self, event: &HeartbeatEvent) {
        let changed = match self
            .handler
            .replica_configuration(&event.service_name, &event.replica_id)
            .await
        {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(service = %event.service_name, replica = %event.replica_id, error = %e, "Replica vanished before publish");
                return;
            }
        };

        let topic = configuration_topic(&changed.service, &self.topic_suffix);
        match self.publisher.publish(&topic, CONFIGURATION_CHANGED, changed.payload()).await {
            Ok(()) => metrics::record_event_published(true),
            Err(e) => {
                metrics::record_event_published(false);
                tracing::warn!(topic = %topic, error = %e, "Failed to publish new replica configuration");
            }
        }
    }
}

impl std::fmt::Debug for EventForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventForwarder")
            .field("topic_suffix", &self.topic_suffix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::publisher::ChannelPublisher;
    use crate::events::types::ReplicaConfiguration;
    use crate::registry::error::RegistryError;
    use serde_json::{json, Map};

    struct ScriptedHandler {
        outcome: RegistryResult<HeartbeatOutcome>,
    }

    #[async_trait]
    impl HeartbeatHandler for ScriptedHandler {
        async fn heartbeat(&self, service: &str, _replica_id: &str) -> RegistryResult<HeartbeatOutcome> {
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(_) => Err(RegistryError::ServiceNotFound(service.to_string())),
            }
        }

        async fn replica_configuration(&self, service: &str, replica_id: &str) -> RegistryResult<ConfigurationChangedEvent> {
            let mut variables = Map::new();
            variables.insert("timeoutMs".to_string(), json!(500));
            Ok(ConfigurationChangedEvent {
                service: service.to_string(),
                replicas: vec![ReplicaConfiguration {
                    replica_id: replica_id.to_string(),
                    variables,
                }],
            })
        }
    }

    fn heartbeat() -> HeartbeatEvent {
        HeartbeatEvent {
            service_name: "orders".into(),
            replica_id: "r2".into(),
        }
    }

    #[tokio::test]
    async fn test_new_replica_is_published() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let handler = Arc::new(ScriptedHandler {
            outcome: Ok(HeartbeatOutcome::ReplicaAdded),
        });
        let forwarder = EventForwarder::new(handler, Arc::new(publisher), "configuration");

        assert_eq!(forwarder.forward(heartbeat()).await, Some(HeartbeatOutcome::ReplicaAdded));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.topic, "orders.configuration");
        assert_eq!(event.data, json!([{ "replicaId": "r2", "variables": { "timeoutMs": 500 } }]));
    }

    #[tokio::test]
    async fn test_refresh_publishes_nothing() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let handler = Arc::new(ScriptedHandler {
            outcome: Ok(HeartbeatOutcome::Refreshed),
        });
        let forwarder = EventForwarder::new(handler, Arc::new(publisher), "configuration");

        assert_eq!(forwarder.forward(heartbeat()).await, Some(HeartbeatOutcome::Refreshed));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replica_joining_registration_publishes_nothing() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let handler = Arc::new(ScriptedHandler {
            outcome: Ok(HeartbeatOutcome::ReplicaQueued),
        });
        let forwarder = EventForwarder::new(handler, Arc::new(publisher), "configuration");

        assert_eq!(forwarder.forward(heartbeat()).await, Some(HeartbeatOutcome::ReplicaQueued));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_errors_are_swallowed() {
        let (publisher, mut rx) = ChannelPublisher::new();
        let handler = Arc::new(ScriptedHandler {
            outcome: Err(RegistryError::ServiceNotFound("orders".into())),
        });
        let forwarder = EventForwarder::new(handler, Arc::new(publisher), "configuration");

        assert_eq!(forwarder.forward(heartbeat()).await, None);
        assert!(rx.try_recv().is_err());
    }
}
