//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber's recv() completes → server drains → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, logging, registry, then listener
//! - In-flight registrations are not awaited on shutdown; state is rebuilt
//!   from heartbeats after restart

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
