//! Merge middleware.
//!
//! Fans one request out to structurally different backend pipelines and
//! combines their partial results into one response.
//!
//! # Completeness
//! The merged response is complete only if every branch answered with a
//! complete response. A missing, failed or incomplete branch leaves the
//! result incomplete, although it still carries whatever data arrived.
//!
//! # Key collisions
//! Branch data is merged in declared backend order; on a top-level key
//! collision the later backend overwrites the earlier one.
//!
//! # Sequential mode
//! Backends run one after another. Scalar fields of branch `N` become params
//! `RespN_field` (nested maps flattened with `.`) for the URL patterns of the
//! following backends. A `BackendFilter` may skip a backend; skipped
//! backends are left out of the completeness check. The first failing branch
//! stops the sequence.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::EndpointConfig;
use crate::observability::metrics;
use crate::proxy::error::{join_result, split_result, ProxyError, ProxyResult};
use crate::proxy::{
    empty_middleware, middleware_fn, proxy_fn, Context, Data, Middleware, Proxy, Request, Response,
};

/// Share of the endpoint timeout granted to the branches.
const MERGE_BUDGET_RATIO: f64 = 0.85;

/// Decides, from the request and the responses so far, whether a backend is called.
pub type BackendFilter = Arc<dyn Fn(&Request, &[Option<Response>]) -> bool + Send + Sync>;

/// Build the merge middleware for an endpoint.
///
/// Panics when the endpoint has no backends, or when the returned middleware
/// is given a number of proxies different from the backend count.
pub fn new_merge_middleware(endpoint: &EndpointConfig) -> Middleware {
    new_merge_middleware_with_filters(endpoint, Vec::new())
}

/// Same as [`new_merge_middleware`], with per-backend filters for sequential mode.
pub fn new_merge_middleware_with_filters(
    endpoint: &EndpointConfig,
    mut filters: Vec<Option<BackendFilter>>,
) -> Middleware {
    let total = endpoint.backends.len();
    assert!(total > 0, "all endpoints must have at least one backend: {}", endpoint.endpoint);
    if total == 1 {
        return empty_middleware();
    }

    filters.resize_with(total, || None);
    let filters: Arc<[Option<BackendFilter>]> = filters.into();
    let budget = endpoint.timeout().mul_f64(MERGE_BUDGET_RATIO);
    let sequential = endpoint.sequential;
    let name: Arc<str> = endpoint.endpoint.as_str().into();

    middleware_fn(move |next| {
        assert!(
            next.len() == total,
            "invalid number of proxies for the merge middleware: expected {}, got {}",
            total,
            next.len()
        );
        let branches: Arc<[Proxy]> = next.into();
        let filters = filters.clone();
        let name = name.clone();

        proxy_fn(move |ctx, req| {
            let branches = branches.clone();
            let filters = filters.clone();
            let name = name.clone();
            async move {
                let ctx = ctx.with_timeout(budget);
                let _guard = ctx.cancel_on_drop();
                let merged = if sequential {
                    sequential_merge(&ctx, &branches, &filters, req).await
                } else {
                    parallel_merge(&ctx, &branches, req).await
                };
                merged.finish(&name)
            }
        })
    })
}

async fn parallel_merge(ctx: &Context, branches: &[Proxy], req: Request) -> Merged {
    let total = branches.len();
    let (tx, mut rx) = mpsc::channel::<(usize, ProxyResult)>(total);

    for (index, branch) in branches.iter().enumerate() {
        let branch_ctx = ctx.child();
        let branch = branch.clone();
        let tx = tx.clone();
        let req = req.clone();
        tokio::spawn(async move {
            let result = call_branch(&branch_ctx, &branch, req).await;
            // Capacity equals the number of branches, so this never waits.
            let _ = tx.try_send((index, result));
        });
    }
    drop(tx);

    let mut merged = Merged::new(total);
    for _ in 0..total {
        match rx.recv().await {
            Some((index, result)) => merged.record(index, result),
            None => break,
        }
    }
    merged
}

async fn sequential_merge(
    ctx: &Context,
    branches: &[Proxy],
    filters: &[Option<BackendFilter>],
    mut req: Request,
) -> Merged {
    let mut merged = Merged::new(branches.len());

    for (index, branch) in branches.iter().enumerate() {
        if let Some(filter) = &filters[index] {
            if !filter(&req, merged.slots.as_slice()) {
                tracing::debug!(backend = index, "Backend skipped by filter");
                merged.skipped[index] = true;
                continue;
            }
        }

        let result = call_branch(&ctx.child(), branch, req.clone()).await;
        let failed = result.is_err();
        merged.record(index, result);

        if let Some(response) = &merged.slots[index] {
            add_response_params(&mut req, index, &response.data);
        }
        if failed {
            tracing::debug!(backend = index, "Sequential merge stopped at failed backend");
            break;
        }
    }

    merged
}

/// Run one branch under its own cancellable context.
async fn call_branch(ctx: &Context, branch: &Proxy, req: Request) -> ProxyResult {
    let result = ctx.run(branch(ctx.clone(), req)).await;
    ctx.cancel();
    match result {
        Ok(None) => Err(ProxyError::NullResult),
        other => other,
    }
}

/// Per-branch slots filled while draining.
struct Merged {
    slots: Vec<Option<Response>>,
    skipped: Vec<bool>,
    last_error: Option<ProxyError>,
}

impl Merged {
    fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            skipped: vec![false; total],
            last_error: None,
        }
    }

    fn record(&mut self, index: usize, result: ProxyResult) {
        let (response, error) = split_result(result);
        if let Some(err) = error {
            tracing::debug!(backend = index, error = %err, "Merge branch failed");
            self.last_error = Some(err);
            self.slots[index] = response.map(|mut r| {
                r.is_complete = false;
                r
            });
        } else {
            self.slots[index] = response;
        }
    }

    fn finish(self, endpoint: &str) -> ProxyResult {
        let is_complete = self
            .slots
            .iter()
            .zip(&self.skipped)
            .all(|(slot, skipped)| *skipped || slot.as_ref().is_some_and(|r| r.is_complete));

        let responses: Vec<Response> = self.slots.into_iter().flatten().collect();
        if responses.is_empty() {
            tracing::warn!(endpoint = %endpoint, "No backend responded");
            metrics::record_merge(endpoint, false);
            return join_result(Some(Response::incomplete()), self.last_error);
        }

        let mut data = Data::new();
        for response in responses {
            data.extend(response.data);
        }

        if !is_complete {
            tracing::warn!(endpoint = %endpoint, "Merged response is incomplete");
        }
        metrics::record_merge(endpoint, is_complete);

        let combined = Response {
            data,
            is_complete,
            ..Default::default()
        };
        join_result(Some(combined), self.last_error)
    }
}

/// Expose the scalar fields of branch `index` as `Resp{index}_` params.
fn add_response_params(req: &mut Request, index: usize, data: &Data) {
    let params = Arc::make_mut(&mut req.params);
    flatten_into(&format!("Resp{}_", index), data, params);
}

fn flatten_into(prefix: &str, data: &Data, out: &mut HashMap<String, String>) {
    for (key, value) in data {
        let name = format!("{}{}", prefix, key);
        match value {
            Value::Object(inner) => flatten_into(&format!("{}.", name), inner, out),
            Value::String(s) => {
                out.insert(name, s.clone());
            }
            Value::Number(n) => {
                out.insert(name, n.to_string());
            }
            Value::Bool(b) => {
                out.insert(name, b.to_string());
            }
            Value::Null | Value::Array(_) => {}
        }
    }
}
