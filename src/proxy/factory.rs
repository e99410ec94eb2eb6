//! Pipeline factory.
//!
//! Composes, once at startup, the callable pipeline of an endpoint:
//!
//! ```text
//! per backend (outermost first):
//!     request builder → load balancing → [concurrent calls] → backend call
//! across backends:
//!     merge (skipped when there is a single backend)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendConfig, EndpointConfig, GatewayConfig};
use crate::load_balancer::{new_balancer, FixedSubscriber, Subscriber};
use crate::proxy::backend::new_http_proxy;
use crate::proxy::balancing::new_load_balanced_middleware;
use crate::proxy::concurrent::new_concurrent_middleware;
use crate::proxy::merge::{new_merge_middleware_with_filters, BackendFilter};
use crate::proxy::request_builder::new_request_builder_middleware;
use crate::proxy::{Context, Proxy, ProxyError, ProxyResult, Request};

/// Builds the network leaf of a backend pipeline.
pub type BackendFactory = Arc<dyn Fn(&EndpointConfig, &BackendConfig) -> Proxy + Send + Sync>;

/// Key of per-backend overrides: endpoint path and backend index.
type BackendKey = (String, usize);

/// Builds endpoint pipelines from validated configuration.
#[derive(Clone)]
pub struct PipelineFactory {
    backend_factory: BackendFactory,
    filters: HashMap<BackendKey, BackendFilter>,
    subscribers: HashMap<BackendKey, Arc<dyn Subscriber>>,
}

impl PipelineFactory {
    /// Create a factory with a custom network leaf.
    pub fn new(backend_factory: BackendFactory) -> Self {
        Self {
            backend_factory,
            filters: HashMap::new(),
            subscribers: HashMap::new(),
        }
    }

    /// Create a factory calling backends over HTTP.
    pub fn http(client: reqwest::Client) -> Self {
        Self::new(Arc::new(move |endpoint: &EndpointConfig, backend: &BackendConfig| {
            new_http_proxy(client.clone(), backend, endpoint.backend_timeout(backend))
        }))
    }

    /// Register a sequential-mode filter for one backend of an endpoint.
    pub fn with_filter(mut self, endpoint: &str, backend: usize, filter: BackendFilter) -> Self {
        self.filters.insert((endpoint.to_string(), backend), filter);
        self
    }

    /// Replace the static host list of one backend with an external subscriber.
    pub fn with_subscriber(
        mut self,
        endpoint: &str,
        backend: usize,
        subscriber: Arc<dyn Subscriber>,
    ) -> Self {
        self.subscribers.insert((endpoint.to_string(), backend), subscriber);
        self
    }

    /// Build the pipelines of every endpoint.
    pub fn build_all(&self, config: &GatewayConfig) -> Result<Vec<Pipeline>, ProxyError> {
        config.endpoints.iter().map(|e| self.build(e)).collect()
    }

    /// Build the pipeline of one endpoint.
    pub fn build(&self, endpoint: &EndpointConfig) -> Result<Pipeline, ProxyError> {
        if endpoint.backends.is_empty() {
            tracing::error!(endpoint = %endpoint.endpoint, "Endpoint has no backends");
            return Err(ProxyError::NoBackends);
        }

        let branches: Vec<Proxy> = endpoint
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| self.backend_pipeline(endpoint, index, backend))
            .collect();

        let filters = (0..endpoint.backends.len())
            .map(|index| self.filters.get(&(endpoint.endpoint.clone(), index)).cloned())
            .collect();
        let proxy = new_merge_middleware_with_filters(endpoint, filters)(branches);

        tracing::info!(
            endpoint = %endpoint.endpoint,
            method = %endpoint.method,
            backends = endpoint.backends.len(),
            sequential = endpoint.sequential,
            "Pipeline built"
        );

        Ok(Pipeline {
            name: endpoint.endpoint.clone(),
            method: endpoint.method.clone(),
            proxy,
            timeout: endpoint.timeout(),
        })
    }

    fn backend_pipeline(
        &self,
        endpoint: &EndpointConfig,
        index: usize,
        backend: &BackendConfig,
    ) -> Proxy {
        let mut proxy = (self.backend_factory)(endpoint, backend);

        let calls = endpoint.backend_concurrent_calls(backend);
        if calls > 1 {
            proxy = new_concurrent_middleware(calls, endpoint.backend_timeout(backend))(vec![proxy]);
        }

        let subscriber = self
            .subscribers
            .get(&(endpoint.endpoint.clone(), index))
            .cloned()
            .unwrap_or_else(|| Arc::new(FixedSubscriber::new(&backend.hosts)));
        let lb = new_balancer(backend.balancer, subscriber);
        proxy = new_load_balanced_middleware(lb)(vec![proxy]);

        new_request_builder_middleware(backend)(vec![proxy])
    }
}

impl std::fmt::Debug for PipelineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineFactory")
            .field("filters", &self.filters.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// The callable pipeline of one endpoint.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    method: String,
    proxy: Proxy,
    timeout: Duration,
}

impl Pipeline {
    /// Endpoint path this pipeline serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The composed proxy, for callers managing their own context.
    pub fn proxy(&self) -> Proxy {
        self.proxy.clone()
    }

    /// Run the pipeline under the endpoint timeout.
    pub async fn call(&self, req: Request) -> ProxyResult {
        self.call_with(&Context::background(), req).await
    }

    /// Run the pipeline under the endpoint timeout, as a child of `parent`.
    pub async fn call_with(&self, parent: &Context, req: Request) -> ProxyResult {
        let ctx = parent.with_timeout(self.timeout);
        let _guard = ctx.cancel_on_drop();
        ctx.run((self.proxy)(ctx.clone(), req)).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .finish()
    }
}
