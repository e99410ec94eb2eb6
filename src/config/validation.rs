//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, concurrency >= 1)
//! - Check every endpoint can actually build a pipeline
//! - Detect duplicated endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{BackendConfig, EndpointConfig, GatewayConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no endpoints defined")]
    NoEndpoints,

    #[error("endpoint {endpoint}: no backends defined")]
    NoBackends { endpoint: String },

    #[error("endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("endpoint {endpoint}, backend #{index}: {reason}")]
    InvalidBackend {
        endpoint: String,
        index: usize,
        reason: String,
    },

    #[error("endpoint {method} {endpoint} is defined more than once")]
    DuplicateEndpoint { endpoint: String, method: String },
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        let key = (endpoint.method.to_uppercase(), endpoint.endpoint.clone());
        if !seen.insert(key) {
            errors.push(ValidationError::DuplicateEndpoint {
                endpoint: endpoint.endpoint.clone(),
                method: endpoint.method.to_uppercase(),
            });
        }
        validate_endpoint(endpoint, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, errors: &mut Vec<ValidationError>) {
    let invalid = |reason: &str| ValidationError::InvalidEndpoint {
        endpoint: endpoint.endpoint.clone(),
        reason: reason.to_string(),
    };

    if !endpoint.endpoint.starts_with('/') {
        errors.push(invalid("path must start with '/'"));
    }
    if endpoint.timeout_ms == 0 {
        errors.push(invalid("timeout must be greater than zero"));
    }
    if endpoint.concurrent_calls == 0 {
        errors.push(invalid("concurrent_calls must be at least 1"));
    }
    if !is_valid_method(&endpoint.method) {
        errors.push(invalid("unsupported method"));
    }
    if endpoint.backends.is_empty() {
        errors.push(ValidationError::NoBackends {
            endpoint: endpoint.endpoint.clone(),
        });
    }

    for (index, backend) in endpoint.backends.iter().enumerate() {
        validate_backend(endpoint, index, backend, errors);
    }
}

fn validate_backend(
    endpoint: &EndpointConfig,
    index: usize,
    backend: &BackendConfig,
    errors: &mut Vec<ValidationError>,
) {
    let invalid = |reason: &str| ValidationError::InvalidBackend {
        endpoint: endpoint.endpoint.clone(),
        index,
        reason: reason.to_string(),
    };

    if backend.hosts.is_empty() {
        errors.push(invalid("no hosts defined"));
    }
    if !backend.url_pattern.starts_with('/') {
        errors.push(invalid("url_pattern must start with '/'"));
    }
    if !is_valid_method(&backend.method) {
        errors.push(invalid("unsupported method"));
    }
    if backend.timeout_ms == Some(0) {
        errors.push(invalid("timeout must be greater than zero"));
    }
    if backend.concurrent_calls == Some(0) {
        errors.push(invalid("concurrent_calls must be at least 1"));
    }
    if !backend.allow.is_empty() && !backend.deny.is_empty() {
        tracing::warn!(
            endpoint = %endpoint.endpoint,
            backend = index,
            "Both allow and deny lists set; the allow list wins"
        );
    }
}

fn is_valid_method(method: &str) -> bool {
    matches!(
        method.to_uppercase().as_str(),
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        let backend = BackendConfig::new("/users/{id}", vec!["http://127.0.0.1:8000".into()]);
        GatewayConfig {
            endpoints: vec![EndpointConfig::new("/users/{id}", vec![backend])],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = valid_config();
        config.endpoints[0].timeout_ms = 0;
        config.endpoints[0].backends[0].hosts.clear();
        config.endpoints[0].backends[0].concurrent_calls = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_endpoint_without_backends() {
        let mut config = valid_config();
        config.endpoints[0].backends.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::NoBackends {
                endpoint: "/users/{id}".into()
            }]
        );
    }

    #[test]
    fn test_duplicate_endpoint() {
        let mut config = valid_config();
        let mut dup = config.endpoints[0].clone();
        dup.method = "get".into();
        config.endpoints.push(dup);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::DuplicateEndpoint { .. }));
    }

    #[test]
    fn test_allow_and_deny_is_not_an_error() {
        let mut config = valid_config();
        config.endpoints[0].backends[0].allow = vec!["a".into()];
        config.endpoints[0].backends[0].deny = vec!["b".into()];
        assert!(validate_config(&config).is_ok());
    }
}
