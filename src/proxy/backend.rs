//! Backend call: the network leaf of every backend pipeline.
//!
//! # Responsibilities
//! - Send the built request to the selected host with `reqwest`
//! - Enforce the backend timeout
//! - Decode the body into data and run the entity formatter
//! - Pass raw bodies through untouched for `no-op` backends
//!
//! # Design Decisions
//! - Only 200 and 201 count as success for decoded backends
//! - Pass-through responses are complete whatever their status
//! - Decoding is behind the `Decoder` trait so collection and plain JSON share the leaf

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use serde_json::Value;

use crate::config::{BackendConfig, Encoding};
use crate::observability::metrics;
use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::formatter::EntityFormatter;
use crate::proxy::response::{Data, Metadata, Response};
use crate::proxy::{proxy_fn, Context, Proxy, Request};

/// Turns a raw backend body into a data tree.
pub trait Decoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Data, ProxyError>;
}

/// Decodes a JSON object.
#[derive(Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Data, ProxyError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Decodes a JSON array and wraps it under `collection`.
#[derive(Debug, Default)]
pub struct JsonCollectionDecoder;

impl Decoder for JsonCollectionDecoder {
    fn decode(&self, body: &[u8]) -> Result<Data, ProxyError> {
        let items: Vec<Value> = serde_json::from_slice(body)?;
        let mut data = Data::new();
        data.insert("collection".to_string(), Value::Array(items));
        Ok(data)
    }
}

/// Pick the decoder for a backend. `None` means pass-through.
pub fn decoder_for(backend: &BackendConfig) -> Option<Arc<dyn Decoder>> {
    match (backend.encoding, backend.is_collection) {
        (Encoding::NoOp, _) => None,
        (Encoding::Json, true) => Some(Arc::new(JsonCollectionDecoder)),
        (Encoding::Json, false) => Some(Arc::new(JsonDecoder)),
    }
}

/// Build the HTTP leaf for one backend of an endpoint.
pub fn new_http_proxy(
    client: reqwest::Client,
    backend: &BackendConfig,
    timeout: std::time::Duration,
) -> Proxy {
    let call = Arc::new(BackendCall {
        client,
        decoder: decoder_for(backend),
        formatter: EntityFormatter::new(backend),
        name: backend.url_pattern.clone(),
    });

    proxy_fn(move |ctx: Context, req: Request| {
        let call = call.clone();
        async move {
            let ctx = ctx.with_timeout(timeout);
            let start = Instant::now();
            let result = ctx.run(call.execute(req)).await;
            metrics::record_backend_call(&call.name, result.is_ok(), start);
            if let Err(err) = &result {
                tracing::debug!(backend = %call.name, error = %err, "Backend call failed");
            }
            result
        }
    })
}

struct BackendCall {
    client: reqwest::Client,
    decoder: Option<Arc<dyn Decoder>>,
    formatter: EntityFormatter,
    name: String,
}

impl BackendCall {
    async fn execute(&self, req: Request) -> ProxyResult {
        let url = req.url.ok_or(ProxyError::MissingUrl)?;
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|_| ProxyError::InvalidMethod(req.method.clone()))?;

        let mut builder = self.client.request(method, url);
        for (name, values) in req.headers.iter() {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let metadata = Metadata {
            status_code: status,
            headers: collect_headers(response.headers()),
        };

        let Some(decoder) = &self.decoder else {
            let body = response.bytes().await?;
            return Ok(Some(Response {
                is_complete: true,
                metadata,
                io: Some(body),
                ..Default::default()
            }));
        };

        if status != 200 && status != 201 {
            return Err(ProxyError::InvalidStatus(status));
        }

        let body = response.bytes().await?;
        let data = decoder.decode(&body)?;
        let response = Response {
            data,
            is_complete: true,
            metadata,
            io: None,
        };
        Ok(Some(self.formatter.format(response)))
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            out.entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    out
}
