//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router with one route per configured endpoint
//! - Translate each inbound request and run the endpoint pipeline
//! - Wire up request tracing and metrics
//! - Serve on a listener with graceful shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Request as HttpRequest},
    http::{HeaderValue, Method},
    response::{IntoResponse, Response as HttpResponse},
    routing::{on, MethodFilter},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::{EndpointConfig, GatewayConfig};
use crate::http::request::{request_id, InputFilter, X_REQUEST_ID};
use crate::http::response::into_http_response;
use crate::observability::metrics;
use crate::proxy::{Pipeline, PipelineFactory, ProxyError};

/// Upper bound on a buffered request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Everything a handler needs for one endpoint.
struct EndpointRoute {
    pipeline: Pipeline,
    input: InputFilter,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Build the pipelines of every endpoint and mount them.
    pub fn new(config: GatewayConfig, factory: &PipelineFactory) -> Result<Self, ProxyError> {
        let router = Self::build_router(&config, factory)?;
        Ok(Self { router, config })
    }

    fn build_router(config: &GatewayConfig, factory: &PipelineFactory) -> Result<Router, ProxyError> {
        let mut router = Router::new();
        for endpoint in &config.endpoints {
            let filter = method_filter(endpoint)?;
            let route = Arc::new(EndpointRoute {
                pipeline: factory.build(endpoint)?,
                input: InputFilter::new(endpoint),
            });

            router = router.route(
                &endpoint.endpoint,
                on(
                    filter,
                    move |params: Option<Path<HashMap<String, String>>>, request: HttpRequest| {
                        let route = route.clone();
                        async move { handle(route, params.map(|p| p.0), request).await }
                    },
                ),
            );
            tracing::debug!(endpoint = %endpoint.endpoint, method = %endpoint.method, "Route mounted");
        }
        Ok(router.layer(TraceLayer::new_for_http()))
    }

    /// The router, for serving or for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.config.endpoints.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn method_filter(endpoint: &EndpointConfig) -> Result<MethodFilter, ProxyError> {
    let invalid = || ProxyError::InvalidMethod(endpoint.method.clone());
    let method = Method::from_bytes(endpoint.method.as_bytes()).map_err(|_| invalid())?;
    MethodFilter::try_from(method).map_err(|_| invalid())
}

async fn handle(
    route: Arc<EndpointRoute>,
    params: Option<HashMap<String, String>>,
    request: HttpRequest,
) -> HttpResponse {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers);
    let span = tracing::info_span!(
        "endpoint",
        request_id = %request_id,
        endpoint = %route.pipeline.name()
    );

    async move {
        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read request body");
                let response = (axum::http::StatusCode::BAD_REQUEST, "Invalid request body").into_response();
                metrics::record_request(route.pipeline.name(), response.status().as_u16(), start);
                return response;
            }
        };

        let req = route
            .input
            .build(&parts, params.unwrap_or_default(), body, &request_id);
        tracing::debug!(method = %req.method, path = %req.path, "Running pipeline");

        let mut response = into_http_response(route.pipeline.call(req).await);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        metrics::record_request(route.pipeline.name(), response.status().as_u16(), start);
        tracing::debug!(
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
