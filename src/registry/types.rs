//! Service, replica and variable records held by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One runtime-configurable setting, at service (global) or replica scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationVariable {
    pub key: String,
    pub value: Value,
}

impl ConfigurationVariable {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Declared shape and initial value of a variable, sourced from the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationVariableDefinition {
    /// Variable key.
    pub key: String,
    /// JSON Schema the value must satisfy.
    #[serde(rename = "type")]
    pub schema: Value,
    /// Value applied when the service first registers.
    pub default_value: Value,
}

impl ConfigurationVariableDefinition {
    /// The schema as a validator document.
    ///
    /// Sidecars may declare a bare type name (`"integer"`) instead of a
    /// schema object; that shorthand is expanded to `{"type": "integer"}`.
    pub fn schema_document(&self) -> Value {
        match &self.schema {
            Value::String(type_name) => serde_json::json!({ "type": type_name }),
            other => other.clone(),
        }
    }

    /// The definition's default as a variable.
    pub fn default_variable(&self) -> ConfigurationVariable {
        ConfigurationVariable::new(self.key.clone(), self.default_value.clone())
    }
}

/// One running instance of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReplica {
    pub id: String,
    pub replica_variables: Vec<ConfigurationVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl ServiceReplica {
    /// A replica seeded with its own copy of `variables`.
    pub fn seeded(id: impl Into<String>, variables: &[ConfigurationVariable]) -> Self {
        Self {
            id: id.into(),
            replica_variables: variables.to_vec(),
            last_seen: None,
        }
    }

    /// Record a heartbeat.
    pub fn touch(&mut self) {
        self.last_seen = Some(Utc::now());
    }

    pub fn variable(&self, key: &str) -> Option<&ConfigurationVariable> {
        self.replica_variables.iter().find(|v| v.key == key)
    }
}

/// Configuration record of one service, keyed by its unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfiguration {
    pub name: String,
    pub replicas: Vec<ServiceReplica>,
    pub global_variables: Vec<ConfigurationVariable>,
    pub variable_definitions: Vec<ConfigurationVariableDefinition>,
}

impl ServiceConfiguration {
    /// The record created on a service's first heartbeat: one replica, no
    /// variables yet.
    pub fn bare(name: impl Into<String>, replica_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replicas: vec![ServiceReplica::seeded(replica_id, &[])],
            global_variables: Vec::new(),
            variable_definitions: Vec::new(),
        }
    }

    pub fn replica(&self, id: &str) -> Option<&ServiceReplica> {
        self.replicas.iter().find(|r| r.id == id)
    }

    pub fn replica_mut(&mut self, id: &str) -> Option<&mut ServiceReplica> {
        self.replicas.iter_mut().find(|r| r.id == id)
    }

    pub fn global_variable(&self, key: &str) -> Option<&ConfigurationVariable> {
        self.global_variables.iter().find(|v| v.key == key)
    }
}

/// Fields to merge into a stored [`ServiceConfiguration`]. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigurationPatch {
    pub replicas: Option<Vec<ServiceReplica>>,
    pub global_variables: Option<Vec<ConfigurationVariable>>,
    pub variable_definitions: Option<Vec<ConfigurationVariableDefinition>>,
}

impl ServiceConfigurationPatch {
    pub fn replicas(replicas: Vec<ServiceReplica>) -> Self {
        Self {
            replicas: Some(replicas),
            ..Self::default()
        }
    }

    pub fn apply(self, target: &mut ServiceConfiguration) {
        if let Some(replicas) = self.replicas {
            target.replicas = replicas;
        }
        if let Some(globals) = self.global_variables {
            target.global_variables = globals;
        }
        if let Some(definitions) = self.variable_definitions {
            target.variable_definitions = definitions;
        }
    }
}

/// Merge `incoming` into `target` by key: existing keys are overwritten,
/// new keys appended in arrival order.
pub fn merge_variables(target: &mut Vec<ConfigurationVariable>, incoming: &[ConfigurationVariable]) {
    for variable in incoming {
        match target.iter_mut().find(|v| v.key == variable.key) {
            Some(existing) => existing.value = variable.value.clone(),
            None => target.push(variable.clone()),
        }
    }
}

/// Flatten a variable list into a `{key: value}` map.
pub fn flatten_variables(variables: &[ConfigurationVariable]) -> Map<String, Value> {
    variables
        .iter()
        .map(|v| (v.key.clone(), v.value.clone()))
        .collect()
}

/// Lifecycle of a service name inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// Never seen, or a failed registration was rolled back.
    Unknown,
    /// First heartbeat seen; waiting on the sidecar for definitions.
    Registering,
    /// Definitions populated.
    Active,
}

/// What a heartbeat did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// First heartbeat of the service; sidecar registration scheduled.
    RegistrationStarted,
    /// The service is registering but its record is gone (deleted while
    /// in flight); nothing was recorded.
    RegistrationPending,
    /// A new replica was added to an active service.
    ReplicaAdded,
    /// A new replica joined while the service is registering. It receives
    /// its configuration with the activation event.
    ReplicaQueued,
    /// Known replica, `last_seen` refreshed.
    Refreshed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites_and_appends() {
        let mut target = vec![
            ConfigurationVariable::new("a", json!(1)),
            ConfigurationVariable::new("b", json!(2)),
        ];
        merge_variables(
            &mut target,
            &[
                ConfigurationVariable::new("b", json!(20)),
                ConfigurationVariable::new("c", json!(30)),
            ],
        );

        assert_eq!(
            target,
            vec![
                ConfigurationVariable::new("a", json!(1)),
                ConfigurationVariable::new("b", json!(20)),
                ConfigurationVariable::new("c", json!(30)),
            ]
        );
    }

    #[test]
    fn test_seeded_replica_is_a_copy() {
        let globals = vec![ConfigurationVariable::new("timeoutMs", json!(500))];
        let mut replica = ServiceReplica::seeded("r1", &globals);
        replica.replica_variables[0].value = json!(900);

        assert_eq!(globals[0].value, json!(500));
    }

    #[test]
    fn test_schema_shorthand_is_expanded() {
        let definition = ConfigurationVariableDefinition {
            key: "timeoutMs".into(),
            schema: json!("integer"),
            default_value: json!(500),
        };
        assert_eq!(definition.schema_document(), json!({ "type": "integer" }));

        let full = ConfigurationVariableDefinition {
            schema: json!({ "type": "string", "minLength": 1 }),
            ..definition
        };
        assert_eq!(full.schema_document(), json!({ "type": "string", "minLength": 1 }));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let mut config = ServiceConfiguration::bare("orders", "r1");
        config.variable_definitions.push(ConfigurationVariableDefinition {
            key: "timeoutMs".into(),
            schema: json!({ "type": "integer" }),
            default_value: json!(500),
        });

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["replicas"][0]["replicaVariables"], json!([]));
        assert!(value["replicas"][0].get("lastSeen").is_none());
        assert_eq!(value["variableDefinitions"][0]["type"], json!({ "type": "integer" }));
        assert_eq!(value["variableDefinitions"][0]["defaultValue"], json!(500));
    }

    #[test]
    fn test_flatten_variables() {
        let flat = flatten_variables(&[
            ConfigurationVariable::new("a", json!("x")),
            ConfigurationVariable::new("b", json!(true)),
        ]);
        assert_eq!(Value::Object(flat), json!({ "a": "x", "b": true }));
    }
}
