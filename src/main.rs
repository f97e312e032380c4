//! Configuration distribution registry.
//!
//! Services announce themselves with heartbeats; the registry learns their
//! declared variables from their sidecar, serves and validates variable
//! updates over REST and pushes every change back out over pub/sub.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!   heartbeat     │                   REGISTRY                       │
//!   (pub/sub) ────┼─▶ events::forwarder ──┐                          │
//!                 │                       ▼                          │
//!   REST      ────┼─▶ http::handlers ──▶ registry::service ──▶ repo  │
//!                 │                       │      │                   │
//!                 │                       │      └─▶ validator       │
//!                 │                       ▼                          │
//!   sidecar   ◀───┼──────────────── sidecar::client                  │
//!                 │                                                  │
//!   pub/sub   ◀───┼──────────────── events::publisher                │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use config_registry::config::{load_config, RegistryConfig};
use config_registry::events::{EventForwarder, EventPublisher, HttpPublisher, NoopPublisher};
use config_registry::lifecycle::{wait_for_signal, Shutdown};
use config_registry::observability::{logging, metrics};
use config_registry::registry::{ConfigurationRegistry, InMemoryRepository, RegistrySettings};
use config_registry::sidecar::SidecarClient;
use config_registry::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "config-registry", version, about = "Configuration distribution registry")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "config-registry starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        sidecar = %config.sidecar.base_url,
        pubsub_enabled = config.pubsub.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let publisher: Arc<dyn EventPublisher> = if config.pubsub.enabled {
        Arc::new(HttpPublisher::new(&config.pubsub)?)
    } else {
        tracing::warn!("Pub/sub disabled; configuration changes will not be published");
        Arc::new(NoopPublisher)
    };

    let registry = ConfigurationRegistry::new(
        Arc::new(InMemoryRepository::new()),
        Arc::new(SidecarClient::new(&config.sidecar)?),
        publisher.clone(),
        RegistrySettings {
            sidecar_timeout: Duration::from_secs(config.sidecar.timeout_secs),
            topic_suffix: config.pubsub.configuration_topic_suffix.clone(),
        },
    );
    let forwarder = Arc::new(EventForwarder::new(
        Arc::new(registry.clone()),
        publisher,
        config.pubsub.configuration_topic_suffix.clone(),
    ));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry, forwarder);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = wait_for_signal() => {
            shutdown.trigger();
        }
    }

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
