//! Variable validation against declared JSON Schemas.
//!
//! # Responsibilities
//! - Locate the definition for every written key
//! - Compile the definition's schema (cached per service and key)
//! - Collect every violation of a batch before failing it
//!
//! # Design Decisions
//! - Definitions are immutable once registered, so a compiled validator
//!   stays valid until the service is re-registered or deleted, at which
//!   point the registry calls [`SchemaValidator::invalidate`].
//! - Missing definitions and schema violations are collected together; a
//!   batch that only lacks definitions fails as `DefinitionMissing`.

use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::Validator;

use crate::registry::error::{RegistryError, RegistryResult, Violation};
use crate::registry::types::{ConfigurationVariable, ConfigurationVariableDefinition};

/// Compiles and caches variable schemas.
#[derive(Default)]
pub struct SchemaValidator {
    compiled: DashMap<(String, String), Arc<Validator>>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a whole batch. `Ok` only when every variable has a
    /// definition and satisfies its schema.
    pub fn validate_batch(
        &self,
        service: &str,
        definitions: &[ConfigurationVariableDefinition],
        variables: &[ConfigurationVariable],
    ) -> RegistryResult<()> {
        let mut missing = Vec::new();
        let mut violations = Vec::new();

        for variable in variables {
            let Some(definition) = definitions.iter().find(|d| d.key == variable.key) else {
                missing.push(variable.key.clone());
                continue;
            };
            violations.extend(self.check(service, definition, variable));
        }

        if violations.is_empty() && missing.is_empty() {
            return Ok(());
        }
        if violations.is_empty() {
            return Err(RegistryError::DefinitionMissing(missing));
        }

        let mut all: Vec<Violation> = missing
            .into_iter()
            .map(|key| Violation {
                key,
                path: String::new(),
                message: "no variable definition".to_string(),
            })
            .collect();
        all.extend(violations);
        Err(RegistryError::ValidationFailed(all))
    }

    /// Drop every cached validator of `service`.
    pub fn invalidate(&self, service: &str) {
        self.compiled.retain(|(owner, _), _| owner != service);
    }

    /// Number of cached validators.
    pub fn cached(&self) -> usize {
        self.compiled.len()
    }

    fn check(
        &self,
        service: &str,
        definition: &ConfigurationVariableDefinition,
        variable: &ConfigurationVariable,
    ) -> Vec<Violation> {
        let validator = match self.compile(service, definition) {
            Ok(validator) => validator,
            Err(message) => {
                return vec![Violation {
                    key: variable.key.clone(),
                    path: String::new(),
                    message,
                }]
            }
        };

        validator
            .iter_errors(&variable.value)
            .map(|error| Violation {
                key: variable.key.clone(),
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect()
    }

    fn compile(&self, service: &str, definition: &ConfigurationVariableDefinition) -> Result<Arc<Validator>, String> {
        let cache_key = (service.to_string(), definition.key.clone());
        if let Some(validator) = self.compiled.get(&cache_key) {
            return Ok(validator.value().clone());
        }

        let validator = jsonschema::validator_for(&definition.schema_document())
            .map(Arc::new)
            .map_err(|e| format!("invalid schema: {}", e))?;
        self.compiled.insert(cache_key, validator.clone());
        Ok(validator)
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("cached", &self.compiled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definitions() -> Vec<ConfigurationVariableDefinition> {
        vec![
            ConfigurationVariableDefinition {
                key: "timeoutMs".into(),
                schema: json!({ "type": "integer" }),
                default_value: json!(500),
            },
            ConfigurationVariableDefinition {
                key: "limits".into(),
                schema: json!({
                    "type": "object",
                    "properties": { "max": { "type": "integer", "minimum": 0 } }
                }),
                default_value: json!({ "max": 10 }),
            },
            ConfigurationVariableDefinition {
                key: "mode".into(),
                schema: json!("string"),
                default_value: json!("fast"),
            },
        ]
    }

    #[test]
    fn test_valid_batch_passes() {
        let validator = SchemaValidator::new();
        let batch = vec![
            ConfigurationVariable::new("timeoutMs", json!(900)),
            ConfigurationVariable::new("limits", json!({ "max": 3 })),
            ConfigurationVariable::new("mode", json!("slow")),
        ];
        assert!(validator.validate_batch("orders", &definitions(), &batch).is_ok());
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let validator = SchemaValidator::new();
        let batch = vec![ConfigurationVariable::new("timeoutMs", json!("abc"))];

        let err = validator.validate_batch("orders", &definitions(), &batch).unwrap_err();
        let RegistryError::ValidationFailed(violations) = err else {
            panic!("expected ValidationFailed, got {err:?}");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].key, "timeoutMs");
        assert!(violations[0].message.contains("integer"));
    }

    #[test]
    fn test_nested_path_is_reported() {
        let validator = SchemaValidator::new();
        let batch = vec![ConfigurationVariable::new("limits", json!({ "max": -1 }))];

        let err = validator.validate_batch("orders", &definitions(), &batch).unwrap_err();
        let violations = err.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/max");
    }

    #[test]
    fn test_all_violations_are_collected() {
        let validator = SchemaValidator::new();
        let batch = vec![
            ConfigurationVariable::new("timeoutMs", json!("abc")),
            ConfigurationVariable::new("mode", json!(7)),
            ConfigurationVariable::new("unknown", json!(1)),
        ];

        let err = validator.validate_batch("orders", &definitions(), &batch).unwrap_err();
        let keys: Vec<_> = err.violations().into_iter().map(|v| v.key).collect();
        assert!(matches!(err, RegistryError::ValidationFailed(_)));
        assert_eq!(keys, vec!["unknown", "timeoutMs", "mode"]);
    }

    #[test]
    fn test_missing_definition_only() {
        let validator = SchemaValidator::new();
        let batch = vec![ConfigurationVariable::new("unknown", json!(1))];

        let err = validator.validate_batch("orders", &definitions(), &batch).unwrap_err();
        assert!(matches!(err, RegistryError::DefinitionMissing(keys) if keys == vec!["unknown"]));
    }

    #[test]
    fn test_compiled_schemas_are_cached_per_service() {
        let validator = SchemaValidator::new();
        let batch = vec![ConfigurationVariable::new("timeoutMs", json!(1))];

        validator.validate_batch("orders", &definitions(), &batch).unwrap();
        validator.validate_batch("orders", &definitions(), &batch).unwrap();
        validator.validate_batch("billing", &definitions(), &batch).unwrap();
        assert_eq!(validator.cached(), 2);

        validator.invalidate("orders");
        assert_eq!(validator.cached(), 1);
    }

    #[test]
    fn test_broken_schema_is_a_violation() {
        let validator = SchemaValidator::new();
        let broken = vec![ConfigurationVariableDefinition {
            key: "weird".into(),
            schema: json!({ "type": 12 }),
            default_value: json!(null),
        }];
        let batch = vec![ConfigurationVariable::new("weird", json!(1))];

        let err = validator.validate_batch("orders", &broken, &batch).unwrap_err();
        assert!(err.violations()[0].message.starts_with("invalid schema"));
    }
}
