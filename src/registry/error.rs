//! Registry error definitions.

use serde::Serialize;
use thiserror::Error;

/// One violated constraint of a variable write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Variable key the violation belongs to.
    pub key: String,
    /// JSON pointer into the value (empty for the value itself).
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.key, self.message)
        } else {
            write!(f, "{}{}: {}", self.key, self.path, self.message)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Replica '{replica}' not found in service '{service}'")]
    ReplicaNotFound { service: String, replica: String },

    #[error("Variable '{key}' not found in {scope}")]
    VariableNotFound { scope: String, key: String },

    #[error("Service '{0}' already exists")]
    AlreadyExists(String),

    /// One or more values failed schema validation; the batch was not applied.
    #[error("Validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<Violation>),

    /// Writes for keys the service never declared.
    #[error("No definition for variable(s): {}", .0.join(", "))]
    DefinitionMissing(Vec<String>),

    /// The sidecar could not be reached or answered unusably.
    #[error("Sidecar unavailable for service '{service}': {reason}")]
    UpstreamUnavailable { service: String, reason: String },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::ServiceNotFound(_)
                | RegistryError::ReplicaNotFound { .. }
                | RegistryError::VariableNotFound { .. }
        )
    }

    /// Per-key details carried by validation failures.
    pub fn violations(&self) -> Vec<Violation> {
        match self {
            RegistryError::ValidationFailed(violations) => violations.clone(),
            RegistryError::DefinitionMissing(keys) => keys
                .iter()
                .map(|key| Violation {
                    key: key.clone(),
                    path: String::new(),
                    message: "no variable definition".to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::ReplicaNotFound {
            service: "orders".into(),
            replica: "r9".into(),
        };
        assert_eq!(err.to_string(), "Replica 'r9' not found in service 'orders'");
        assert!(err.is_not_found());

        let err = RegistryError::ValidationFailed(vec![
            Violation {
                key: "timeoutMs".into(),
                path: String::new(),
                message: "\"abc\" is not of type \"integer\"".into(),
            },
            Violation {
                key: "limits".into(),
                path: "/max".into(),
                message: "-1 is less than the minimum of 0".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("timeoutMs: \"abc\""));
        assert!(text.contains("limits/max: -1"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_definition_missing_details() {
        let err = RegistryError::DefinitionMissing(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "No definition for variable(s): a, b");
        let details = err.violations();
        assert_eq!(details.len(), 2);
        assert_eq!(details[1].key, "b");
    }
}
