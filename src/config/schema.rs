//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Endpoint definitions, each linked to one or more backends.
    pub endpoints: Vec<EndpointConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A gateway-facing route definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Path exposed by the gateway, with `{param}` placeholders.
    pub endpoint: String,

    /// HTTP method accepted by the endpoint.
    #[serde(default = "default_method")]
    pub method: String,

    /// Total time budget for one invocation, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Redundant calls issued per backend when the backend does not set its own.
    #[serde(default = "default_concurrent_calls")]
    pub concurrent_calls: usize,

    /// Call backends one after another, feeding earlier responses into later URLs.
    #[serde(default)]
    pub sequential: bool,

    /// Query string keys forwarded to the backends.
    #[serde(default)]
    pub input_query_strings: Vec<String>,

    /// Header names forwarded to the backends.
    #[serde(default)]
    pub input_headers: Vec<String>,

    /// Backends called for this endpoint, in declared order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl EndpointConfig {
    /// Create an endpoint with defaults and the given backends.
    pub fn new(endpoint: impl Into<String>, backends: Vec<BackendConfig>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: default_method(),
            timeout_ms: default_timeout_ms(),
            concurrent_calls: default_concurrent_calls(),
            sequential: false,
            input_query_strings: Vec::new(),
            input_headers: Vec::new(),
            backends,
        }
    }

    /// Endpoint time budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective backend timeout: its own, or the endpoint's.
    pub fn backend_timeout(&self, backend: &BackendConfig) -> Duration {
        backend
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.timeout())
    }

    /// Effective number of redundant calls for a backend.
    pub fn backend_concurrent_calls(&self, backend: &BackendConfig) -> usize {
        backend.concurrent_calls.unwrap_or(self.concurrent_calls)
    }
}

/// One backend resource called by an endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Path pattern on the backend, with `{param}` or `{{.Param}}` placeholders.
    pub url_pattern: String,

    /// HTTP method used against the backend.
    #[serde(default = "default_method")]
    pub method: String,

    /// Hosts serving this backend (e.g., "http://127.0.0.1:8000").
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Host selection strategy.
    #[serde(default)]
    pub balancer: BalancerKind,

    /// Per-backend timeout in milliseconds (defaults to the endpoint timeout).
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Redundant calls (defaults to the endpoint value).
    #[serde(default)]
    pub concurrent_calls: Option<usize>,

    /// How the backend body is turned into data.
    #[serde(default)]
    pub encoding: Encoding,

    /// The backend answers with a top-level JSON array.
    #[serde(default)]
    pub is_collection: bool,

    /// Dotted field paths to keep. Wins over `deny` when non-empty.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Dotted field paths to remove.
    #[serde(default)]
    pub deny: Vec<String>,

    /// Top-level key renames (old -> new).
    #[serde(default)]
    pub mapping: HashMap<String, String>,

    /// Wrap the whole payload under this key.
    #[serde(default)]
    pub group: Option<String>,

    /// Dotted path of an object lifted to the root.
    #[serde(default)]
    pub target: Option<String>,
}

impl BackendConfig {
    /// Create a backend with defaults for the given pattern and hosts.
    pub fn new(url_pattern: impl Into<String>, hosts: Vec<String>) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            method: default_method(),
            hosts,
            balancer: BalancerKind::default(),
            timeout_ms: None,
            concurrent_calls: None,
            encoding: Encoding::default(),
            is_collection: false,
            allow: Vec::new(),
            deny: Vec::new(),
            mapping: HashMap::new(),
            group: None,
            target: None,
        }
    }
}

/// Load balancing strategy for a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancerKind {
    #[default]
    RoundRobin,
    Random,
}

/// Response body handling for a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Encoding {
    /// Decode JSON and run the entity formatter.
    #[default]
    #[serde(rename = "json")]
    Json,
    /// Pass the raw body through untouched.
    #[serde(rename = "no-op")]
    NoOp,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_concurrent_calls() -> usize {
    1
}
