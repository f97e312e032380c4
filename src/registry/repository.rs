//! Keyed store of service configuration records.
//!
//! # Responsibilities
//! - Hold one [`ServiceConfiguration`] per service name
//! - Reject duplicate names on create
//! - Merge partial updates into stored records
//!
//! # Design Decisions
//! - Reads hand out snapshots; writes go through `update` with a patch.
//!   Read-modify-write sequences are serialized by the registry's
//!   per-service lock, not here.
//! - `find_all` is sorted by name so listings are stable.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::types::{ServiceConfiguration, ServiceConfigurationPatch};

/// Storage seam of the registry.
pub trait ConfigurationRepository: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` on a duplicate name.
    fn create(&self, config: ServiceConfiguration) -> RegistryResult<ServiceConfiguration>;

    fn exists(&self, name: &str) -> bool;

    fn find_by_name(&self, name: &str) -> RegistryResult<ServiceConfiguration>;

    fn find_all(&self) -> Vec<ServiceConfiguration>;

    /// Merge `patch` into the stored record and return the result.
    fn update(&self, name: &str, patch: ServiceConfigurationPatch) -> RegistryResult<ServiceConfiguration>;

    /// Returns true if a record was removed.
    fn delete(&self, name: &str) -> bool;

    fn count(&self) -> usize;
}

/// Memory-resident repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    services: DashMap<String, ServiceConfiguration>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigurationRepository for InMemoryRepository {
    fn create(&self, config: ServiceConfiguration) -> RegistryResult<ServiceConfiguration> {
        match self.services.entry(config.name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(config.name)),
            Entry::Vacant(slot) => {
                slot.insert(config.clone());
                Ok(config)
            }
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    fn find_by_name(&self, name: &str) -> RegistryResult<ServiceConfiguration> {
        self.services
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| RegistryError::ServiceNotFound(name.to_string()))
    }

    fn find_all(&self) -> Vec<ServiceConfiguration> {
        let mut all: Vec<_> = self.services.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    fn update(&self, name: &str, patch: ServiceConfigurationPatch) -> RegistryResult<ServiceConfiguration> {
        let mut stored = self
            .services
            .get_mut(name)
            .ok_or_else(|| RegistryError::ServiceNotFound(name.to_string()))?;
        patch.apply(stored.value_mut());
        Ok(stored.value().clone())
    }

    fn delete(&self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }

    fn count(&self) -> usize {
        self.services.len()
    }
}
