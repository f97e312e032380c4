//! HTTP surface of the registry.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request ID, trace, timeout, body limit)
//!     → handlers.rs (configuration REST routes)
//!     → events.rs (pub/sub subscription and heartbeat delivery)
//!     → error.rs (RegistryError → status code + JSON body)
//! ```

pub mod error;
pub mod events;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, HttpServer, X_REQUEST_ID};
