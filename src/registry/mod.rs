//! Service configuration registry.
//!
//! # Data Flow
//! ```text
//! heartbeat(service, replica)
//!     → service.rs (per-service lock)
//!     → repository.rs lookup
//!     → unknown service: bare record + spawned sidecar registration
//!     → known service: add replica / refresh last_seen
//!
//! REST mutation
//!     → service.rs (per-service lock)
//!     → validator.rs (all-or-nothing schema check)
//!     → merge + repository.rs update
//!     → events publisher (fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - State is memory-resident and rebuilt from heartbeats after a restart
//! - Storage, definitions and publishing are injected through traits
//! - A global update overwrites every replica's variables with the new
//!   global set

pub mod error;
pub mod repository;
pub mod service;
pub mod types;
pub mod validator;

pub use error::{RegistryError, RegistryResult, Violation};
pub use repository::{ConfigurationRepository, InMemoryRepository};
pub use service::{ConfigurationRegistry, RegistrySettings};
pub use types::{
    ConfigurationVariable, ConfigurationVariableDefinition, HeartbeatOutcome, RegistrationState,
    ServiceConfiguration, ServiceReplica,
};
pub use validator::SchemaValidator;
