//! Pub/sub event subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     bus → POST /events/heartbeat
//!     → forwarder.rs (HeartbeatEvent)
//!     → registry heartbeat (register / add replica / refresh)
//!     → new replica? publish its configuration
//!
//! Outbound:
//!     registry mutation
//!     → ConfigurationChangedEvent (types.rs)
//!     → publisher.rs → topic "<service>.<suffix>"
//! ```
//!
//! # Design Decisions
//! - The forwarder knows the registry only through `HeartbeatHandler`
//! - The registry knows the bus only through `EventPublisher`
//! - Publishing is fire-and-forget; failures are logged and counted

pub mod forwarder;
pub mod publisher;
pub mod types;

pub use forwarder::{EventForwarder, HeartbeatHandler};
pub use publisher::{ChannelPublisher, EventPublisher, HttpPublisher, NoopPublisher, PublishedEvent};
pub use types::{ConfigurationChangedEvent, HeartbeatEvent, PublishError, ReplicaConfiguration, CONFIGURATION_CHANGED};
