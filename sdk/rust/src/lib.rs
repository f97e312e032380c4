//! Typed client for the configuration registry's REST and heartbeat surface.

pub mod client;

pub use client::{
    ApiErrorBody, RegistryClient, Replica, SdkError, SdkResult, Service, Variable, VariableDefinition, Violation,
};
