//! Configuration registry core.
//!
//! # Responsibilities
//! - Heartbeat-driven registration of services and replicas
//! - Validated batch updates of global and replica variables
//! - Replica and service deletion
//! - Publishing configuration changes for affected replicas
//!
//! # State Machine
//! ```text
//! service: Unknown → Registering → Active
//!          Registering → Unknown   (sidecar failure, record rolled back)
//! replica: Unknown → Active
//! ```
//!
//! # Concurrency
//! - Every read-modify-write of a service record runs under that service's
//!   async mutex; different services never contend.
//! - The `registering` set is the in-flight marker of a registration. It is
//!   acquired with insert-if-absent and released by [`RegistrationMarker`]
//!   on every completion path.
//! - The sidecar round-trip runs outside the service mutex, so heartbeats of
//!   other replicas keep landing while the service is registering.
//! - Only heartbeats create a service mutex. Deleting a service or rolling
//!   back its registration removes the mutex while holding it; a waiter that
//!   wakes on a removed mutex starts over.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::events::forwarder::HeartbeatHandler;
use crate::events::publisher::EventPublisher;
use crate::events::types::{configuration_topic, ConfigurationChangedEvent, CONFIGURATION_CHANGED};
use crate::observability::metrics;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::repository::ConfigurationRepository;
use crate::registry::types::{
    merge_variables, ConfigurationVariable, ConfigurationVariableDefinition, HeartbeatOutcome,
    RegistrationState, ServiceConfiguration, ServiceConfigurationPatch, ServiceReplica,
};
use crate::registry::validator::SchemaValidator;
use crate::sidecar::DefinitionSource;

/// Tunables of the registry.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Upper bound of one sidecar registration round-trip.
    pub sidecar_timeout: Duration,
    /// Suffix of the per-service configuration topic.
    pub topic_suffix: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            sidecar_timeout: Duration::from_secs(10),
            topic_suffix: "configuration".to_string(),
        }
    }
}

struct RegistryInner {
    repository: Arc<dyn ConfigurationRepository>,
    definitions: Arc<dyn DefinitionSource>,
    publisher: Arc<dyn EventPublisher>,
    validator: SchemaValidator,
    registering: Arc<DashSet<String>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    settings: RegistrySettings,
}

/// In-flight registration marker of one service. Released on drop.
#[derive(Debug)]
pub struct RegistrationMarker {
    registering: Arc<DashSet<String>>,
    service: String,
}

impl RegistrationMarker {
    /// Insert-if-absent; `None` when a registration is already in flight.
    fn acquire(registering: &Arc<DashSet<String>>, service: &str) -> Option<Self> {
        if !registering.insert(service.to_string()) {
            return None;
        }
        Some(Self {
            registering: registering.clone(),
            service: service.to_string(),
        })
    }
}

impl Drop for RegistrationMarker {
    fn drop(&mut self) {
        self.registering.remove(&self.service);
    }
}

/// The configuration registry. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConfigurationRegistry {
    inner: Arc<RegistryInner>,
}

impl ConfigurationRegistry {
    pub fn new(
        repository: Arc<dyn ConfigurationRepository>,
        definitions: Arc<dyn DefinitionSource>,
        publisher: Arc<dyn EventPublisher>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                repository,
                definitions,
                publisher,
                validator: SchemaValidator::new(),
                registering: Arc::new(DashSet::new()),
                locks: DashMap::new(),
                settings,
            }),
        }
    }

    fn is_current_lock(&self, service: &str, lock: &Arc<Mutex<()>>) -> bool {
        self.inner
            .locks
            .get(service)
            .is_some_and(|current| Arc::ptr_eq(current.value(), lock))
    }

    /// Lock `service`, creating its mutex on first use. Heartbeat path only.
    async fn lock_or_create(&self, service: &str) -> OwnedMutexGuard<()> {
        loop {
            let lock = self
                .inner
                .locks
                .entry(service.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let guard = lock.clone().lock_owned().await;
            if self.is_current_lock(service, &lock) {
                return guard;
            }
        }
    }

    /// Lock a service that has a mutex; `ServiceNotFound` otherwise.
    async fn lock_existing(&self, service: &str) -> RegistryResult<OwnedMutexGuard<()>> {
        loop {
            let lock = self
                .inner
                .locks
                .get(service)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| RegistryError::ServiceNotFound(service.to_string()))?;
            let guard = lock.clone().lock_owned().await;
            if self.is_current_lock(service, &lock) {
                return Ok(guard);
            }
        }
    }

    /// Drop the mutex of a removed service. Caller holds its guard.
    fn release_lock(&self, service: &str) {
        self.inner.locks.remove(service);
    }

    /// Number of registered services.
    pub fn service_count(&self) -> usize {
        self.inner.repository.count()
    }

    pub fn registration_state(&self, service: &str) -> RegistrationState {
        if self.inner.registering.contains(service) {
            RegistrationState::Registering
        } else if self.inner.repository.exists(service) {
            RegistrationState::Active
        } else {
            RegistrationState::Unknown
        }
    }

    // --- Heartbeats ---

    /// Record a heartbeat of `replica_id`.
    ///
    /// The first heartbeat of an unknown service creates a bare record and
    /// schedules the sidecar registration without waiting for it.
    pub async fn heartbeat(&self, service: &str, replica_id: &str) -> RegistryResult<HeartbeatOutcome> {
        let _guard = self.lock_or_create(service).await;

        if !self.inner.repository.exists(service) {
            let Some(marker) = RegistrationMarker::acquire(&self.inner.registering, service) else {
                tracing::debug!(service = %service, replica = %replica_id, "Heartbeat while registration in flight");
                metrics::record_heartbeat("pending");
                return Ok(HeartbeatOutcome::RegistrationPending);
            };

            let mut bare = ServiceConfiguration::bare(service, replica_id);
            for replica in &mut bare.replicas {
                replica.touch();
            }
            self.inner.repository.create(bare)?;
            metrics::record_service_count(self.inner.repository.count());

            tracing::info!(service = %service, replica = %replica_id, "New service, registering");
            let registry = self.clone();
            let service = service.to_string();
            tokio::spawn(async move {
                registry.complete_registration(&service, marker).await;
            });

            metrics::record_heartbeat("registration_started");
            return Ok(HeartbeatOutcome::RegistrationStarted);
        }

        let mut config = self.inner.repository.find_by_name(service)?;
        let outcome = match config.replica_mut(replica_id) {
            Some(replica) => {
                replica.touch();
                HeartbeatOutcome::Refreshed
            }
            None => {
                let mut replica = ServiceReplica::seeded(replica_id, &config.global_variables);
                replica.touch();
                config.replicas.push(replica);
                if self.inner.registering.contains(service) {
                    tracing::info!(service = %service, replica = %replica_id, "Replica added while registering");
                    HeartbeatOutcome::ReplicaQueued
                } else {
                    tracing::info!(service = %service, replica = %replica_id, "Replica added");
                    HeartbeatOutcome::ReplicaAdded
                }
            }
        };
        self.inner
            .repository
            .update(service, ServiceConfigurationPatch::replicas(config.replicas))?;

        metrics::record_heartbeat(match outcome {
            HeartbeatOutcome::ReplicaAdded => "replica_added",
            HeartbeatOutcome::ReplicaQueued => "replica_queued",
            _ => "refreshed",
        });
        Ok(outcome)
    }

    /// Fetch definitions and activate the service, or roll the bare record
    /// back so the next heartbeat retries.
    async fn complete_registration(&self, service: &str, marker: RegistrationMarker) {
        let fetched = match timeout(
            self.inner.settings.sidecar_timeout,
            self.inner.definitions.fetch_definitions(service),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RegistryError::UpstreamUnavailable {
                service: service.to_string(),
                reason: format!(
                    "registration timed out after {} seconds",
                    self.inner.settings.sidecar_timeout.as_secs()
                ),
            }),
        };

        let _guard = match self.lock_existing(service).await {
            Ok(guard) => guard,
            Err(_) => {
                drop(marker);
                tracing::warn!(service = %service, "Service removed while registering");
                metrics::record_registration(false);
                return;
            }
        };

        let definitions = match fetched {
            Ok(definitions) => definitions,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Registration failed, will retry on next heartbeat");
                self.inner.repository.delete(service);
                self.release_lock(service);
                metrics::record_service_count(self.inner.repository.count());
                metrics::record_registration(false);
                drop(marker);
                return;
            }
        };

        match self.activate(service, definitions) {
            Ok(config) => {
                drop(marker);
                tracing::info!(
                    service = %service,
                    variables = config.variable_definitions.len(),
                    replicas = config.replicas.len(),
                    "Service registered"
                );
                metrics::record_registration(true);
                self.publish(ConfigurationChangedEvent::for_all_replicas(&config));
            }
            Err(e) => {
                drop(marker);
                tracing::warn!(service = %service, error = %e, "Service removed while registering");
                metrics::record_registration(false);
            }
        }
    }

    fn activate(
        &self,
        service: &str,
        definitions: Vec<ConfigurationVariableDefinition>,
    ) -> RegistryResult<ServiceConfiguration> {
        let mut config = self.inner.repository.find_by_name(service)?;
        let globals: Vec<ConfigurationVariable> = definitions
            .iter()
            .map(ConfigurationVariableDefinition::default_variable)
            .collect();

        // Replicas that joined while registering were seeded from the then
        // empty global list.
        for replica in &mut config.replicas {
            if replica.replica_variables.is_empty() {
                replica.replica_variables = globals.clone();
            }
        }

        self.inner.validator.invalidate(service);
        self.inner.repository.update(
            service,
            ServiceConfigurationPatch {
                replicas: Some(config.replicas),
                global_variables: Some(globals),
                variable_definitions: Some(definitions),
            },
        )
    }

    // --- Variable updates ---

    /// Validate and merge `variables` into the service's global variables,
    /// then overwrite every replica's variables with the new global set.
    pub async fn batch_add_or_update_service_variables(
        &self,
        service: &str,
        variables: Vec<ConfigurationVariable>,
    ) -> RegistryResult<ServiceConfiguration> {
        let _guard = self.lock_existing(service).await?;

        let mut config = self.inner.repository.find_by_name(service)?;
        if let Err(e) = self
            .inner
            .validator
            .validate_batch(service, &config.variable_definitions, &variables)
        {
            metrics::record_variable_update("service", false);
            return Err(e);
        }

        merge_variables(&mut config.global_variables, &variables);
        for replica in &mut config.replicas {
            replica.replica_variables = config.global_variables.clone();
        }

        let updated = self.inner.repository.update(
            service,
            ServiceConfigurationPatch {
                replicas: Some(config.replicas),
                global_variables: Some(config.global_variables),
                variable_definitions: None,
            },
        )?;

        tracing::info!(service = %service, count = variables.len(), "Global variables updated");
        metrics::record_variable_update("service", true);
        self.publish(ConfigurationChangedEvent::for_all_replicas(&updated));
        Ok(updated)
    }

    /// Validate and merge `variables` into one replica's variables.
    pub async fn batch_add_or_update_replica_variables(
        &self,
        service: &str,
        replica_id: &str,
        variables: Vec<ConfigurationVariable>,
    ) -> RegistryResult<ServiceConfiguration> {
        let _guard = self.lock_existing(service).await?;

        let mut config = self.inner.repository.find_by_name(service)?;
        if config.replica(replica_id).is_none() {
            return Err(replica_not_found(service, replica_id));
        }
        if let Err(e) = self
            .inner
            .validator
            .validate_batch(service, &config.variable_definitions, &variables)
        {
            metrics::record_variable_update("replica", false);
            return Err(e);
        }

        let replica = config
            .replica_mut(replica_id)
            .ok_or_else(|| replica_not_found(service, replica_id))?;
        merge_variables(&mut replica.replica_variables, &variables);
        let event = ConfigurationChangedEvent::for_replica(service, replica);

        let updated = self
            .inner
            .repository
            .update(service, ServiceConfigurationPatch::replicas(config.replicas))?;

        tracing::info!(service = %service, replica = %replica_id, count = variables.len(), "Replica variables updated");
        metrics::record_variable_update("replica", true);
        self.publish(event);
        Ok(updated)
    }

    /// Single-variable form of the global batch update.
    pub async fn add_or_update_service_variable(
        &self,
        service: &str,
        variable: ConfigurationVariable,
    ) -> RegistryResult<ConfigurationVariable> {
        let key = variable.key.clone();
        let updated = self
            .batch_add_or_update_service_variables(service, vec![variable])
            .await?;
        updated
            .global_variable(&key)
            .cloned()
            .ok_or_else(|| variable_not_found(format!("service '{}'", service), &key))
    }

    /// Single-variable form of the replica batch update.
    pub async fn add_or_update_replica_variable(
        &self,
        service: &str,
        replica_id: &str,
        variable: ConfigurationVariable,
    ) -> RegistryResult<ConfigurationVariable> {
        let key = variable.key.clone();
        let updated = self
            .batch_add_or_update_replica_variables(service, replica_id, vec![variable])
            .await?;
        updated
            .replica(replica_id)
            .and_then(|r| r.variable(&key))
            .cloned()
            .ok_or_else(|| variable_not_found(format!("replica '{}'", replica_id), &key))
    }

    // --- Deletion ---

    pub async fn delete_service(&self, service: &str) -> RegistryResult<()> {
        let _guard = self.lock_existing(service).await?;

        let removed = self.inner.repository.delete(service);
        self.release_lock(service);
        if !removed {
            return Err(RegistryError::ServiceNotFound(service.to_string()));
        }
        self.inner.validator.invalidate(service);
        metrics::record_service_count(self.inner.repository.count());
        tracing::info!(service = %service, "Service deleted");
        Ok(())
    }

    /// Remove one replica. The service stays even when it has no replicas left.
    pub async fn delete_replica(&self, service: &str, replica_id: &str) -> RegistryResult<()> {
        let _guard = self.lock_existing(service).await?;

        let mut config = self.inner.repository.find_by_name(service)?;
        let position = config
            .replicas
            .iter()
            .position(|r| r.id == replica_id)
            .ok_or_else(|| replica_not_found(service, replica_id))?;
        config.replicas.remove(position);

        self.inner
            .repository
            .update(service, ServiceConfigurationPatch::replicas(config.replicas))?;
        tracing::info!(service = %service, replica = %replica_id, "Replica deleted");
        Ok(())
    }

    // --- Reads ---

    pub fn services(&self) -> Vec<ServiceConfiguration> {
        self.inner.repository.find_all()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services().into_iter().map(|c| c.name).collect()
    }

    pub fn service(&self, service: &str) -> RegistryResult<ServiceConfiguration> {
        self.inner.repository.find_by_name(service)
    }

    pub fn variable_definitions(&self, service: &str) -> RegistryResult<Vec<ConfigurationVariableDefinition>> {
        Ok(self.service(service)?.variable_definitions)
    }

    pub fn service_variables(&self, service: &str) -> RegistryResult<Vec<ConfigurationVariable>> {
        Ok(self.service(service)?.global_variables)
    }

    pub fn service_variable(&self, service: &str, key: &str) -> RegistryResult<ConfigurationVariable> {
        self.service(service)?
            .global_variable(key)
            .cloned()
            .ok_or_else(|| variable_not_found(format!("service '{}'", service), key))
    }

    pub fn replicas(&self, service: &str) -> RegistryResult<Vec<ServiceReplica>> {
        Ok(self.service(service)?.replicas)
    }

    pub fn replica(&self, service: &str, replica_id: &str) -> RegistryResult<ServiceReplica> {
        self.service(service)?
            .replica(replica_id)
            .cloned()
            .ok_or_else(|| replica_not_found(service, replica_id))
    }

    pub fn replica_variables(&self, service: &str, replica_id: &str) -> RegistryResult<Vec<ConfigurationVariable>> {
        Ok(self.replica(service, replica_id)?.replica_variables)
    }

    pub fn replica_variable(&self, service: &str, replica_id: &str, key: &str) -> RegistryResult<ConfigurationVariable> {
        self.replica(service, replica_id)?
            .variable(key)
            .cloned()
            .ok_or_else(|| variable_not_found(format!("replica '{}'", replica_id), key))
    }

    // --- Publishing ---

    /// Fire-and-forget publish of a configuration change.
    fn publish(&self, event: ConfigurationChangedEvent) {
        if event.replicas.is_empty() {
            return;
        }
        let publisher = self.inner.publisher.clone();
        let topic = configuration_topic(&event.service, &self.inner.settings.topic_suffix);
        let payload = event.payload();

        tokio::spawn(async move {
            match publisher.publish(&topic, CONFIGURATION_CHANGED, payload).await {
                Ok(()) => metrics::record_event_published(true),
                Err(e) => {
                    metrics::record_event_published(false);
                    tracing::warn!(topic = %topic, error = %e, "Failed to publish configuration change");
                }
            }
        });
    }
}

fn replica_not_found(service: &str, replica_id: &str) -> RegistryError {
    RegistryError::ReplicaNotFound {
        service: service.to_string(),
        replica: replica_id.to_string(),
    }
}

fn variable_not_found(scope: String, key: &str) -> RegistryError {
    RegistryError::VariableNotFound {
        scope,
        key: key.to_string(),
    }
}

#[async_trait]
impl HeartbeatHandler for ConfigurationRegistry {
    async fn heartbeat(&self, service: &str, replica_id: &str) -> RegistryResult<HeartbeatOutcome> {
        ConfigurationRegistry::heartbeat(self, service, replica_id).await
    }

    async fn replica_configuration(&self, service: &str, replica_id: &str) -> RegistryResult<ConfigurationChangedEvent> {
        let replica = self.replica(service, replica_id)?;
        Ok(ConfigurationChangedEvent::for_replica(service, &replica))
    }
}

impl std::fmt::Debug for ConfigurationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationRegistry")
            .field("services", &self.inner.repository.count())
            .field("registering", &self.inner.registering.len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}
