//! Request-builder middleware.
//!
//! Rewrites the shared request into the backend-specific one: the backend
//! URL pattern gets its `{{.Param}}` tokens replaced with request params and
//! the backend method is set. No I/O, never fails.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::proxy::request::normalize_param;
use crate::proxy::{middleware_fn, proxy_fn, single_next, Middleware};

/// Build the middleware for one backend.
pub fn new_request_builder_middleware(backend: &BackendConfig) -> Middleware {
    let pattern: Arc<str> = normalize_pattern(&backend.url_pattern).into();
    let method: Arc<str> = backend.method.to_uppercase().into();

    middleware_fn(move |next| {
        let next = single_next(next, "request builder");
        let pattern = pattern.clone();
        let method = method.clone();
        proxy_fn(move |ctx, mut req| {
            req.path = generate_path(&pattern, &req.params);
            req.method = method.to_string();
            let next = next.clone();
            async move { next(ctx, req).await }
        })
    })
}

/// Turn `{param}` placeholders into `{{.Param}}` tokens.
///
/// Patterns already written with tokens are returned unchanged.
pub fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if tail.starts_with("{{") {
            match tail.find("}}") {
                Some(end) => {
                    out.push_str(&tail[..end + 2]);
                    rest = &tail[end + 2..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
            continue;
        }

        match tail.find('}') {
            Some(end) => {
                out.push_str("{{.");
                out.push_str(&normalize_param(&tail[1..end]));
                out.push_str("}}");
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Substitute `{{.Name}}` tokens with params. Unknown names stay as written.
pub fn generate_path(pattern: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("{{.") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find("}}") else {
            out.push_str(tail);
            return out;
        };

        let name = &tail[3..end];
        match params.get(name) {
            Some(value) => out.push_str(value),
            None => {
                tracing::debug!(param = %name, "No value for URL pattern param");
                out.push_str(&tail[..end + 2]);
            }
        }
        rest = &tail[end + 2..];
    }

    out.push_str(rest);
    out
}
