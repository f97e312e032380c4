//! Pub/sub subscription surface.
//!
//! The sidecar asks `GET /dapr/subscribe` which topics to deliver and then
//! posts every heartbeat to `/events/heartbeat`.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::events::types::InboundHeartbeat;
use crate::http::server::AppState;

pub const HEARTBEAT_ROUTE: &str = "/events/heartbeat";

/// One entry of the subscription declaration.
#[derive(Debug, Serialize)]
pub struct Subscription {
    pub pubsubname: String,
    pub topic: String,
    pub route: &'static str,
}

/// Delivery verdict returned to the bus.
#[derive(Debug, Serialize)]
pub struct DeliveryStatus {
    pub status: &'static str,
}

pub async fn subscriptions(State(state): State<AppState>) -> Json<Vec<Subscription>> {
    Json(vec![Subscription {
        pubsubname: state.pubsub.pubsub_name.clone(),
        topic: state.pubsub.heartbeat_topic.clone(),
        route: HEARTBEAT_ROUTE,
    }])
}

/// Always answers 200; an undecodable event is dropped rather than
/// redelivered.
pub async fn heartbeat(State(state): State<AppState>, Json(body): Json<Value>) -> Json<DeliveryStatus> {
    let event = match serde_json::from_value::<InboundHeartbeat>(body) {
        Ok(inbound) => inbound.into_event(),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable heartbeat");
            return Json(DeliveryStatus { status: "DROP" });
        }
    };

    state.forwarder.forward(event).await;
    Json(DeliveryStatus { status: "SUCCESS" })
}
