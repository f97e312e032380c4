//! Configuration distribution registry library.

pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod sidecar;

pub use config::schema::RegistryConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::ConfigurationRegistry;
