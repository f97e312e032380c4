//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Serve on a bound listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{PubSubConfig, RegistryConfig};
use crate::events::EventForwarder;
use crate::http::{events, handlers};
use crate::registry::ConfigurationRegistry;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: ConfigurationRegistry,
    pub forwarder: Arc<EventForwarder>,
    pub pubsub: Arc<PubSubConfig>,
}

/// HTTP server for the registry.
pub struct HttpServer {
    router: Router,
    config: RegistryConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RegistryConfig, registry: ConfigurationRegistry, forwarder: Arc<EventForwarder>) -> Self {
        let state = AppState {
            registry,
            forwarder,
            pubsub: Arc::new(config.pubsub.clone()),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RegistryConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/dapr/subscribe", get(events::subscriptions))
            .route(events::HEARTBEAT_ROUTE, post(events::heartbeat))
            .route("/configuration", get(handlers::list_services))
            .route("/configuration/names", get(handlers::list_service_names))
            .route(
                "/configuration/{service}",
                get(handlers::get_service).delete(handlers::delete_service),
            )
            .route(
                "/configuration/{service}/defined-variables",
                get(handlers::get_defined_variables),
            )
            .route(
                "/configuration/{service}/variables",
                get(handlers::get_service_variables).put(handlers::put_service_variables),
            )
            .route(
                "/configuration/{service}/variables/{variable}",
                get(handlers::get_service_variable).put(handlers::put_service_variable),
            )
            .route("/configuration/{service}/replicas", get(handlers::list_replicas))
            .route(
                "/configuration/{service}/replicas/{replica}",
                axum::routing::delete(handlers::delete_replica),
            )
            .route(
                "/configuration/{service}/replicas/{replica}/variables",
                get(handlers::get_replica_variables).put(handlers::put_replica_variables),
            )
            .route(
                "/configuration/{service}/replicas/{replica}/variables/{variable}",
                get(handlers::get_replica_variable).put(handlers::put_replica_variable),
            )
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving with a custom listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}
