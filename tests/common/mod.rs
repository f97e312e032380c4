//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use config_registry::config::RegistryConfig;
use config_registry::events::{EventForwarder, EventPublisher, HttpPublisher};
use config_registry::lifecycle::Shutdown;
use config_registry::registry::{ConfigurationRegistry, InMemoryRepository, RegistrySettings};
use config_registry::sidecar::SidecarClient;
use config_registry::HttpServer;
use registry_sdk::RegistryClient;

/// A request as seen by a mock server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(CapturedRequest { method, path, body })
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        204 => "204 No Content",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a programmable mock sidecar. The handler receives the request path
/// and returns a status and JSON body.
pub async fn start_mock_sidecar<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = f(request.path).await;
                write_response(&mut socket, status, &body).await;
            });
        }
    });
}

/// Start a mock pub/sub endpoint that accepts every publish and forwards it
/// to the returned channel.
pub async fn start_mock_pubsub(addr: SocketAddr) -> mpsc::UnboundedReceiver<CapturedRequest> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    let _ = tx.send(request);
                }
                write_response(&mut socket, 204, "").await;
            });
        }
    });

    rx
}

/// Ports of one test's registry, sidecar and pub/sub endpoint.
#[derive(Debug, Clone, Copy)]
pub struct TestPorts {
    pub registry: u16,
    pub sidecar: u16,
    pub pubsub: u16,
}

impl TestPorts {
    pub fn sidecar_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.sidecar))
    }

    pub fn pubsub_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.pubsub))
    }
}

pub fn test_config(ports: TestPorts) -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.listener.bind_address = format!("127.0.0.1:{}", ports.registry);
    config.sidecar.base_url = format!("http://127.0.0.1:{}/v1.0/invoke", ports.sidecar);
    config.sidecar.timeout_secs = 2;
    config.pubsub.base_url = format!("http://127.0.0.1:{}", ports.pubsub);
    config.pubsub.timeout_secs = 2;
    config.observability.metrics_enabled = false;
    config
}

/// Start a registry wired to real sidecar and pub/sub clients.
pub async fn start_registry(config: RegistryConfig) -> (RegistryClient, Shutdown) {
    let publisher: Arc<dyn EventPublisher> = Arc::new(HttpPublisher::new(&config.pubsub).unwrap());
    let registry = ConfigurationRegistry::new(
        Arc::new(InMemoryRepository::new()),
        Arc::new(SidecarClient::new(&config.sidecar).unwrap()),
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

    let url = format!("http://{}", config.listener.bind_address);
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry, forwarder);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (RegistryClient::new(&url), shutdown)
}

/// Poll until `service` is registered with its definitions applied.
pub async fn wait_for_registration(client: &RegistryClient, service: &str) {
    for _ in 0..100 {
        if let Ok(config) = client.service(service).await {
            if !config.variable_definitions.is_empty() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("service '{}' did not register in time", service);
}

/// Receive the next captured request or fail after a timeout.
pub async fn next_publish(rx: &mut mpsc::UnboundedReceiver<CapturedRequest>) -> CapturedRequest {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("no event published in time")
        .expect("pub/sub mock stopped")
}
