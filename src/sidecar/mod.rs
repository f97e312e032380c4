//! Sidecar integration.
//!
//! # Data Flow
//! ```text
//! first heartbeat of a service
//!     → registry spawns registration
//!     → client.rs GET <base>/<service>/method/_ecs/defined-variables
//!     → Vec<ConfigurationVariableDefinition>
//! ```
//!
//! # Constraints
//! - Every request is bounded by `sidecar.timeout_secs`
//! - Failures surface as `UpstreamUnavailable`; the registry retries on the
//!   next heartbeat

pub mod client;

pub use client::{DefinitionSource, SidecarClient};
