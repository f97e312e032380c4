//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs parse
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::RegistryConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError {
            field,
            message: format!("'{}' is not a socket address ({})", value, e),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if !url.cannot_be_a_base() => {}
        Ok(_) => errors.push(ValidationError {
            field,
            message: format!("'{}' cannot be used as a base URL", value),
        }),
        Err(e) => errors.push(ValidationError {
            field,
            message: format!("'{}' is not a URL ({})", value, e),
        }),
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field,
            message: "must be greater than 0".to_string(),
        });
    }
}

fn check_non_empty(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field,
            message: "must not be empty".to_string(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError {
            field: "listener.max_body_size",
            message: "must be greater than 0".to_string(),
        });
    }

    check_url(&mut errors, "sidecar.base_url", &config.sidecar.base_url);
    check_non_empty(&mut errors, "sidecar.defined_variables_method", &config.sidecar.defined_variables_method);
    check_positive(&mut errors, "sidecar.timeout_secs", config.sidecar.timeout_secs);

    if config.pubsub.enabled {
        check_url(&mut errors, "pubsub.base_url", &config.pubsub.base_url);
        check_non_empty(&mut errors, "pubsub.pubsub_name", &config.pubsub.pubsub_name);
        check_positive(&mut errors, "pubsub.timeout_secs", config.pubsub.timeout_secs);
    }
    check_non_empty(&mut errors, "pubsub.heartbeat_topic", &config.pubsub.heartbeat_topic);
    check_non_empty(
        &mut errors,
        "pubsub.configuration_topic_suffix",
        &config.pubsub.configuration_topic_suffix,
    );

    check_positive(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&RegistryConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_urls() {
        let mut config = RegistryConfig::default();
        config.sidecar.base_url = "not a url".to_string();
        config.pubsub.base_url = "mailto:ops@example.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["sidecar.base_url", "pubsub.base_url"]);
    }

    #[test]
    fn test_disabled_pubsub_skips_transport_checks() {
        let mut config = RegistryConfig::default();
        config.pubsub.enabled = false;
        config.pubsub.base_url = String::new();
        assert!(validate_config(&config).is_ok());

        config.pubsub.heartbeat_topic = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "pubsub.heartbeat_topic");
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = RegistryConfig::default();
        config.observability.metrics_address = "bogus".to_string();
        assert!(validate_config(&config).is_err());

        config.observability.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
