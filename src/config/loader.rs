//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::proxy::request_builder::normalize_pattern;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse, normalize and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    for endpoint in &mut config.endpoints {
        endpoint.method = endpoint.method.to_uppercase();
        for backend in &mut endpoint.backends {
            backend.method = backend.method.to_uppercase();
            backend.url_pattern = normalize_pattern(&backend.url_pattern);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BalancerKind, Encoding};

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:9000"

        [[endpoints]]
        endpoint = "/users/{id}"
        timeout_ms = 1500
        sequential = true

          [[endpoints.backends]]
          url_pattern = "/users/{id}"
          method = "get"
          hosts = ["127.0.0.1:8000"]
          balancer = "random"
          allow = ["id", "profile.name"]
          mapping = { id = "user_id" }
          group = "user"

          [[endpoints.backends]]
          url_pattern = "/posts/{resp0_user.user_id}"
          hosts = ["http://127.0.0.1:8001"]
          encoding = "no-op"
          timeout_ms = 500
          concurrent_calls = 3
    "#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");

        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.method, "GET");
        assert_eq!(endpoint.timeout_ms, 1500);
        assert!(endpoint.sequential);
        assert_eq!(endpoint.backends.len(), 2);

        let users = &endpoint.backends[0];
        assert_eq!(users.url_pattern, "/users/{{.Id}}");
        assert_eq!(users.method, "GET");
        assert_eq!(users.balancer, BalancerKind::Random);
        assert_eq!(users.group.as_deref(), Some("user"));
        assert_eq!(users.mapping.get("id").map(String::as_str), Some("user_id"));

        let posts = &endpoint.backends[1];
        assert_eq!(posts.url_pattern, "/posts/{{.Resp0_user.user_id}}");
        assert_eq!(posts.encoding, Encoding::NoOp);
        assert_eq!(endpoint.backend_concurrent_calls(posts), 3);
        assert_eq!(endpoint.backend_timeout(posts).as_millis(), 500);
        assert_eq!(endpoint.backend_timeout(users).as_millis(), 1500);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        let content = r#"
            [[endpoints]]
            endpoint = "/empty"
        "#;
        match parse_config(content) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("endpoints = 3"), Err(ConfigError::Parse(_))));
    }
}
