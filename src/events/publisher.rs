//! Event publishers.
//!
//! # Responsibilities
//! - Deliver a named event with a JSON payload to a topic
//! - Bound every delivery attempt with a timeout
//!
//! # Design Decisions
//! - At-most-once: a failed publish is reported to the caller, never retried
//! - `HttpPublisher` speaks the sidecar pub/sub HTTP API
//! - `ChannelPublisher` hands events to an in-process receiver

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;
use uuid::Uuid;

use crate::config::PubSubConfig;
use crate::events::types::PublishError;

/// Capability the registry publishes through.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<(), PublishError>;
}

/// Body of a published event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    pub id: Uuid,
    pub topic: String,
    pub event: String,
    pub data: Value,
}

impl PublishedEvent {
    pub fn new(topic: &str, event: &str, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            event: event.to_string(),
            data,
        }
    }
}

/// Publishes through the sidecar's `/v1.0/publish/<pubsub>/<topic>` endpoint.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    base_url: Url,
    pubsub_name: String,
    timeout_duration: Duration,
}

impl HttpPublisher {
    pub fn new(config: &PubSubConfig) -> Result<Self, PublishError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PublishError::Transport(format!("Invalid pub/sub URL '{}': {}", config.base_url, e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            pubsub_name: config.pubsub_name.clone(),
            timeout_duration: Duration::from_secs(config.timeout_secs),
        })
    }

    fn topic_url(&self, topic: &str) -> Result<Url, PublishError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PublishError::Transport(format!("Pub/sub URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v1.0", "publish", self.pubsub_name.as_str(), topic]);
        Ok(url)
    }
}

#[async_trait]
impl EventPublisher for HttpPublisher {
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<(), PublishError> {
        let url = self.topic_url(topic)?;
        let body = PublishedEvent::new(topic, event, payload);

        let request = self.client.post(url).json(&body).send();
        let response = match timeout(self.timeout_duration, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(PublishError::Transport(e.to_string())),
            Err(_) => return Err(PublishError::Timeout(self.timeout_duration.as_secs())),
        };

        if !response.status().is_success() {
            return Err(PublishError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(topic = %topic, event = %event, id = %body.id, "Event published");
        Ok(())
    }
}

/// Forwards events to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<PublishedEvent>,
}

impl ChannelPublisher {
    /// Create the publisher and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PublishedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<(), PublishError> {
        self.tx
            .send(PublishedEvent::new(topic, event, payload))
            .map_err(|_| PublishError::ChannelClosed)
    }
}

/// Used when pub/sub is disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, topic: &str, event: &str, _payload: Value) -> Result<(), PublishError> {
        tracing::debug!(topic = %topic, event = %event, "Pub/sub disabled, event discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_publisher_delivers() {
        let (publisher, mut rx) = ChannelPublisher::new();
        publisher
            .publish("orders.configuration", "configuration-changed", json!([]))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "orders.configuration");
        assert_eq!(event.event, "configuration-changed");
        assert_eq!(event.data, json!([]));
    }

    #[tokio::test]
    async fn test_channel_publisher_reports_closed_channel() {
        let (publisher, rx) = ChannelPublisher::new();
        drop(rx);

        let err = publisher.publish("t", "e", json!(null)).await.unwrap_err();
        assert!(matches!(err, PublishError::ChannelClosed));
    }

    #[test]
    fn test_topic_url() {
        let config = PubSubConfig {
            base_url: "http://127.0.0.1:3500/".to_string(),
            pubsub_name: "bus".to_string(),
            ..PubSubConfig::default()
        };
        let publisher = HttpPublisher::new(&config).unwrap();

        assert_eq!(
            publisher.topic_url("orders.configuration").unwrap().as_str(),
            "http://127.0.0.1:3500/v1.0/publish/bus/orders.configuration"
        );
    }

    #[tokio::test]
    async fn test_http_publisher_unreachable() {
        let config = PubSubConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..PubSubConfig::default()
        };
        let publisher = HttpPublisher::new(&config).unwrap();

        let result = publisher.publish("orders.configuration", "configuration-changed", json!([])).await;
        assert!(result.is_err());
    }
}
